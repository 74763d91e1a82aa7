use std::sync::Arc;

use crate::config::Config;
use crate::router::Router;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub config: Arc<Config>,
}
