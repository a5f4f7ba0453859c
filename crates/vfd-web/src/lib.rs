//! External Adapter (C7): the HTTP/WebSocket surface over the Drive
//! Control Core.
//!
//! ```ignore
//! use vfd_web::{GatewayWebServer, WebConfig};
//!
//! let server = GatewayWebServer::new(WebConfig::default(), core);
//! server.start().await?;
//! ```

mod api;
mod metrics;
mod state;
mod websocket;

pub use metrics::GatewayMetrics;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use vfd_core::DriveControlCore;

/// Configuration for the external adapter's HTTP server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Enable permissive CORS, matching the pack's development-mode default.
    pub enable_cors: bool,
    /// `wsstate` broadcast channel capacity per subscriber.
    pub ws_channel_capacity: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("valid default address"),
            enable_cors: true,
            ws_channel_capacity: 256,
        }
    }
}

/// The external adapter's HTTP/WebSocket server.
pub struct GatewayWebServer {
    config: WebConfig,
    state: AppState,
}

impl GatewayWebServer {
    /// Build a server bound to the given core. The snapshot ticker and HTTP
    /// listener are not started until [`GatewayWebServer::start`].
    #[must_use]
    pub fn new(config: WebConfig, core: Arc<DriveControlCore>) -> Self {
        let state = AppState::new(core, config.ws_channel_capacity);
        Self { config, state }
    }

    /// Start the periodic snapshot ticker and serve HTTP until `shutdown`
    /// carries `true`, letting in-flight requests finish (§4.9 step 6).
    pub async fn start(self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        let bind_addr = self.config.bind_addr;
        info!(addr = %bind_addr, "starting external adapter");

        tokio::spawn(websocket::run_snapshot_ticker(self.state.clone()));

        let app = self.build_router();
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        info!(addr = %bind_addr, "external adapter listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;
        Ok(())
    }

    fn build_router(self) -> Router {
        let vfds = Router::new()
            .route("/", get(api::list_drives))
            .route("/:id/state", get(api::get_state))
            .route("/:id/read/:code/:n", get(api::read_registers))
            .route("/:id/clear_alarm", get(api::clear_alarm))
            .route("/:id/drive_mode", post(api::set_drive_mode))
            .route("/:id/frequency", post(api::set_frequency))
            .route("/:id/wsstate", get(websocket::wsstate_handler));

        let mut app = Router::new()
            .route("/health", get(api::health))
            .route("/metrics", get(metrics::metrics_handler))
            .nest("/vfds", vfds)
            .with_state(self.state);

        if self.config.enable_cors {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_common::types::{DriveDescriptor, VfdModel};
    use vfd_core::TransportFactory;
    use vfd_transport::{MockTransport, Transport};

    fn descriptor(id: &str) -> DriveDescriptor {
        DriveDescriptor {
            id: id.to_string(),
            display_name: id.to_string(),
            slave_id: 1,
            model: VfdModel::Frenic,
        }
    }

    #[tokio::test]
    async fn build_router_does_not_panic_with_empty_registry() {
        let factory: TransportFactory =
            Box::new(|| Ok(Box::new(MockTransport::new()) as Box<dyn Transport + Send>));
        let core = Arc::new(DriveControlCore::new(vec![descriptor("VFD1")], factory));
        let server = GatewayWebServer::new(WebConfig::default(), core);
        let _router = server.build_router();
    }
}
