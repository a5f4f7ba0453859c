//! VFD supervisory gateway daemon entry point.
//!
//! Wires the Drive Control Core to a real serial transport, starts the
//! Poller and the external HTTP/WebSocket adapter, and shuts both down
//! cleanly on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use vfd_common::config::GatewayConfig;
use vfd_core::{DriveControlCore, TransportFactory};
use vfd_transport::{RtuConfig, RtuTransport, Transport};
use vfd_web::{GatewayWebServer, WebConfig};

/// VFD supervisory gateway command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "vfd-gatewayd",
    about = "VFD supervisory gateway - Modbus RTU bus owner, poller, and HTTP adapter",
    version,
    long_about = None
)]
struct Args {
    /// Path to the gateway's YAML configuration document.
    #[arg(long, short = 'c', value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the serial device path from the configuration file.
    #[arg(long, value_name = "PATH")]
    serial_path: Option<String>,

    /// Address to bind the HTTP adapter to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = format!("vfd_gatewayd={level},vfd_core={level},vfd_web={level},vfd_transport={level},vfd_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config from {:?}", args.config))?;
    if let Some(path) = &args.serial_path {
        config.modbus_path = path.clone();
    }
    Ok(config)
}

/// Builds the factory the Bus Arbiter calls whenever it (re)opens the
/// serial port: once at startup, and again on every bus recovery attempt
/// the Poller triggers (§4.5.2).
fn rtu_factory(rtu_config: RtuConfig) -> TransportFactory {
    Box::new(move || {
        RtuTransport::open(&rtu_config).map(|t| Box::new(t) as Box<dyn Transport + Send>)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting VFD supervisory gateway");

    let config = load_config(&args)?;
    let descriptors = config.drive_descriptors();
    info!(
        drives = descriptors.len(),
        serial_path = %config.modbus_path,
        baud_rate = config.baud_rate,
        "configuration loaded"
    );

    let rtu_config = RtuConfig {
        path: config.modbus_path.clone(),
        baud_rate: config.baud_rate,
    };
    let core = Arc::new(DriveControlCore::new(descriptors, rtu_factory(rtu_config)));

    if let Err(err) = core.initialize().await {
        // Not fatal: the Poller retries recovery once failures accumulate
        // (§4.5.2). A gateway that refuses to start because a drive isn't
        // powered on yet would defeat its own purpose.
        error!(%err, "initial bus initialization failed, starting anyway");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let poller_core = Arc::clone(&core);
    let poller_shutdown = shutdown_rx.clone();
    let poller_handle = tokio::spawn(async move {
        poller_core.run_poller(poller_shutdown).await;
    });

    let web_config = WebConfig {
        bind_addr: args.bind_addr,
        ..WebConfig::default()
    };
    let server = GatewayWebServer::new(web_config, Arc::clone(&core));
    let server_handle = tokio::spawn(server.start(shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    match server_handle.await {
        Ok(Ok(())) => info!("external adapter exited"),
        Ok(Err(err)) => error!(%err, "external adapter failed"),
        Err(err) => error!(%err, "external adapter task panicked"),
    }
    if let Err(err) = poller_handle.await {
        error!(%err, "poller task panicked");
    }

    info!("VFD supervisory gateway shut down");
    Ok(())
}

/// Waits for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["vfd-gatewayd"]);
        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert!(args.serial_path.is_none());
        assert_eq!(args.bind_addr.port(), 8080);
    }

    #[test]
    fn args_parse_with_overrides() {
        let args = Args::parse_from([
            "vfd-gatewayd",
            "-c",
            "custom.yaml",
            "--serial-path",
            "/dev/ttyUSB1",
            "--bind-addr",
            "127.0.0.1:9090",
        ]);
        assert_eq!(args.config, PathBuf::from("custom.yaml"));
        assert_eq!(args.serial_path.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(args.bind_addr.port(), 9090);
    }
}
