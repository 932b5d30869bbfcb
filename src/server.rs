//! HTTP surface: the ingress handler (§4.A) and the observability
//! endpoints (§4.F), wired together over one shared [`AppState`].
//!
//! Routes are registered with a single HTTP method each (`post`/`get`); axum
//! already returns `405 Method Not Allowed` for any other method on a
//! registered path, so no handler needs to check `req.method()` itself.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::body::Bytes;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, SinkDescriptor};
use crate::dispatcher::{Dispatcher, DispatchStatsSnapshot};
use crate::message::LogPacket;
use crate::queue::{humanize_age, RetryQueue};
use crate::scheduler::fan_out;

/// Shared, read-only-after-startup state handed to every request handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub sinks: Arc<Vec<SinkDescriptor>>,
    pub dispatcher: Arc<Dispatcher>,
    pub retry_queue: Arc<RetryQueue>,
    pub fan_out_semaphore: Arc<tokio::sync::Semaphore>,
}

/// Error returned when the `/logs` body fails to parse as a [`LogPacket`].
///
/// Implements axum's `IntoResponse` directly so the handler can return it as
/// an `Err` and have it become the required `400` response without an
/// intermediate mapping layer.
pub struct IngestError(String);

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid log packet: {}", self.0)
    }
}

impl std::error::Error for IngestError {}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Build the distributor's axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/logs", post(ingest_logs))
        .route("/health", get(health))
        .route("/queue", get(queue_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /logs` (§4.A): parse the packet, acknowledge immediately, and hand
/// the messages to the fan-out scheduler as a detached task. The handler
/// never waits on sink I/O.
async fn ingest_logs(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, IngestError> {
    let packet: LogPacket =
        serde_json::from_slice(&body).map_err(|e| IngestError(e.to_string()))?;

    info!(
        packet_id = %packet.packet_id,
        agent_id = %packet.agent_id,
        message_count = packet.messages.len(),
        "accepted log packet"
    );

    tokio::spawn(fan_out(packet.messages, state));

    Ok((StatusCode::OK, "Log packet received successfully"))
}

/// `GET /health` (§4.F): liveness only.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "Distributor is healthy")
}

#[derive(Serialize)]
struct QueueStatusResponse {
    queue_size: usize,
    oldest_message_age: String,
    timestamp: String,
    dispatch_stats: DispatchStatsSnapshot,
}

/// `GET /queue` (§4.F): queue size, the age of its oldest entry, and the
/// running dispatch counters (§5(c)/§10.1).
async fn queue_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.retry_queue.snapshot().await;
    let body = QueueStatusResponse {
        queue_size: snapshot.queue_size,
        oldest_message_age: humanize_age(snapshot.oldest_queued_at),
        timestamp: chrono::Utc::now().to_rfc3339(),
        dispatch_stats: state.dispatcher.stats.snapshot(),
    };
    Json(body)
}
