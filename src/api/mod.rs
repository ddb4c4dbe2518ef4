// HTTP surface: the Discord interactions endpoint plus health and metrics.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ed25519_dalek::VerifyingKey;
use serde_json::json;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::bot::Bot;
use crate::discord::verify::{verify_request, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::discord::{parse_interaction, Interaction, Reply};
use crate::metrics;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<Bot>,
    pub public_key: VerifyingKey,
    pub media_base: Option<Url>,
}

// ── Helpers ───────────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/interactions", post(interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "tower-maiden" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Every request must carry a valid signature over `timestamp ++ body`.
async fn interactions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (Some(signature), Some(timestamp)) = (
        header(&headers, SIGNATURE_HEADER),
        header(&headers, TIMESTAMP_HEADER),
    ) else {
        return json_error(StatusCode::UNAUTHORIZED, "Missing request signature");
    };
    if !verify_request(&state.public_key, signature, timestamp, &body) {
        tracing::debug!("Rejected interaction with bad signature");
        return json_error(StatusCode::UNAUTHORIZED, "Invalid request signature");
    }

    let reply = match parse_interaction(&body) {
        Ok(Interaction::Ping) => Reply::Pong,
        Ok(Interaction::Event(event)) => state.bot.handle(event).await,
        Err(e) => {
            tracing::warn!("Unparseable interaction: {e}");
            return json_error(StatusCode::BAD_REQUEST, "Malformed interaction");
        }
    };
    Json(reply.to_json(state.media_base.as_ref())).into_response()
}
