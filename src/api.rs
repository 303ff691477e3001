use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use metrics::counter;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::pipeline::Pipeline;
use crate::verify::{Scheme, SignatureHeaders, WebhookVerifier};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub verifier: Arc<WebhookVerifier>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/webhook/incident-io", post(webhook_incident_io))
        .route("/webhook/generic/{provider}", post(webhook_generic))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "statuswatch",
        "status": "running",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "incident.io": "/webhook/incident-io",
            "generic": "/webhook/generic/{provider}",
            "health": "/health",
            "stats": "/stats",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "seen_incidents": state.pipeline.seen_incidents(),
    }))
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.pipeline.stats();
    Json(json!({
        "seen_incidents_count": stats.seen_incidents_count,
        "admitted_total": stats.admitted_total,
        "suppressed_total": stats.suppressed_total,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn webhook_incident_io(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(state, "incident.io", Scheme::Svix, &headers, &body).await
}

async fn webhook_generic(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(state, &provider, Scheme::GenericHmac, &headers, &body).await
}

async fn handle_webhook(
    state: AppState,
    provider: &str,
    scheme: Scheme,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    counter!("webhook_received_total").increment(1);

    let sig = signature_headers(headers);
    if let Err(e) = state.verifier.check(scheme, provider, &sig, body) {
        counter!("webhook_rejected_total").increment(1);
        tracing::warn!(provider = %provider, error = %e, "webhook rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid JSON: {e}") })),
            )
                .into_response();
        }
    };

    let admitted = state.pipeline.ingest_webhook(provider, &payload).await;

    Json(json!({
        "status": "received",
        "admitted": admitted,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Pull the signature-relevant headers into the framework-free shape the
/// verifier works on.
fn signature_headers(headers: &HeaderMap) -> SignatureHeaders {
    let h = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    SignatureHeaders {
        webhook_id: h("webhook-id"),
        timestamp: h("webhook-timestamp").or_else(|| h("x-timestamp")),
        signature: h("webhook-signature")
            .or_else(|| h("x-signature"))
            .or_else(|| h("x-hub-signature-256")),
    }
}
