pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod presence;
pub mod router;
pub mod state;
pub mod storage;
pub mod websocket;

use std::sync::Arc;

use axum::routing::get;

use crate::state::AppState;

pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
}

/// Wires the router against the configured storage backend. Postgres when
/// `DATABASE_URL` is set, otherwise the volatile in-memory store.
pub async fn build_state(config: Arc<config::Config>) -> Result<AppState, error::AppError> {
    use crate::storage::{ConversationStore, FriendRequestLedger, IdentityDirectory};

    let (directory, ledger, conversations): (
        Arc<dyn IdentityDirectory>,
        Arc<dyn FriendRequestLedger>,
        Arc<dyn ConversationStore>,
    ) = match config.database_url.as_deref() {
        Some(url) => {
            let pool = storage::postgres::init_pool(url)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            storage::postgres::run_migrations(&pool)
                .await
                .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;
            let store = Arc::new(storage::postgres::PgStore::new(pool));
            (store.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using volatile in-memory storage");
            let store = Arc::new(storage::memory::MemoryStore::new());
            (store.clone(), store.clone(), store)
        }
    };

    let presence = Arc::new(presence::InMemoryPresence::new());
    let router = Arc::new(router::Router::new(
        directory,
        ledger,
        conversations,
        presence,
    ));

    Ok(AppState { router, config })
}
