use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

static WS_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "chat_service_ws_connections",
        "Currently open websocket connections",
    )
    .expect("failed to create chat_service_ws_connections");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_service_ws_connections");
    gauge
});

static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_service_events_total",
            "Inbound events dispatched to the router",
        ),
        &["event"],
    )
    .expect("failed to create chat_service_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_service_events_total");
    counter
});

static MESSAGES_STORED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "chat_service_messages_stored_total",
        "Messages durably appended to a conversation",
    )
    .expect("failed to create chat_service_messages_stored_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_service_messages_stored_total");
    counter
});

static PUSHES_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "chat_service_pushes_skipped_total",
        "Best-effort pushes skipped because the peer was unreachable",
    )
    .expect("failed to create chat_service_pushes_skipped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_service_pushes_skipped_total");
    counter
});

pub fn record_ws_opened() {
    WS_CONNECTIONS.inc();
}

pub fn record_ws_closed() {
    WS_CONNECTIONS.dec();
}

pub fn record_event(name: &str) {
    EVENTS_TOTAL.with_label_values(&[name]).inc();
}

pub fn record_message_stored() {
    MESSAGES_STORED_TOTAL.inc();
}

pub fn record_push_skipped() {
    PUSHES_SKIPPED_TOTAL.inc();
}

pub async fn metrics_handler() -> Response {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        tracing::error!(error=%e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
