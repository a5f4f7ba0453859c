//! Shared application state handed to every handler via [`axum::Extension`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use vfd_common::types::DriveState;
use vfd_core::DriveControlCore;

use crate::metrics::GatewayMetrics;

/// A full state-mirror snapshot, keyed by drive id, as pushed to every
/// `wsstate` subscriber (§4.7).
pub type Snapshot = Arc<HashMap<String, DriveState>>;

/// Everything a handler needs: the Drive Control Core, the broadcast
/// channel the periodic ticker publishes snapshots on, and the Prometheus
/// metrics the `/metrics` endpoint renders.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<DriveControlCore>,
    pub broadcast_tx: broadcast::Sender<Snapshot>,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Build application state around an already-constructed core. The
    /// broadcast channel is created here; the caller is responsible for
    /// spawning the periodic snapshot ticker (§4.7) that publishes on it.
    #[must_use]
    pub fn new(core: Arc<DriveControlCore>, ws_channel_capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(ws_channel_capacity);
        Self {
            core,
            broadcast_tx,
            metrics: Arc::new(GatewayMetrics::new()),
        }
    }
}
