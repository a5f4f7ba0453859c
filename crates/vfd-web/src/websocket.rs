//! Live-state WebSocket streaming (§4.7): `GET /vfds/{id}/wsstate`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::{AppState, Snapshot};

const BROADCAST_PERIOD: Duration = Duration::from_millis(200);

/// Runs forever, publishing a full state-mirror snapshot every 200 ms. This
/// ticker is independent of the Poller's own 200 ms cadence — they share a
/// period, not a clock (§4.7).
pub async fn run_snapshot_ticker(state: AppState) -> ! {
    let mut tick = interval(BROADCAST_PERIOD);
    loop {
        tick.tick().await;
        let snapshot: Snapshot = std::sync::Arc::new(state.core.registry().snapshot_all());
        // No subscribers is not an error; the sender just has nothing to do.
        let _ = state.broadcast_tx.send(snapshot);
    }
}

/// `GET /vfds/{id}/wsstate` upgrade handler.
pub async fn wsstate_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, id: String) {
    info!(drive = %id, "wsstate client connected");
    let mut rx = state.broadcast_tx.subscribe();

    loop {
        match rx.recv().await {
            Ok(snapshot) => match serde_json::to_string(&*snapshot) {
                Ok(json) => {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "failed to serialize wsstate snapshot");
                    break;
                }
            },
            Err(broadcast::error::RecvError::Lagged(dropped)) => {
                // A client that can't keep up is dropped, not buffered (§4.7).
                warn!(drive = %id, dropped, "wsstate client lagged, closing");
                break;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    debug!(drive = %id, "wsstate client disconnected");
}
