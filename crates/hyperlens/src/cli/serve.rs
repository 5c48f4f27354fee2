//! Serve command - run the HTTP upload service

use anyhow::Result;
use hyperlens_engine::{Dispatcher, ProcessEngine};
use hyperlens_protocol::HyperlensConfig;
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for the serve command
#[derive(Debug)]
pub struct ServeArgs {
    pub bind: Option<String>,
    pub staging_dir: Option<PathBuf>,
}

/// Execute the serve command
pub async fn run(args: ServeArgs, mut config: HyperlensConfig) -> Result<()> {
    config.apply_overrides(None, args.bind, args.staging_dir);
    let engine = ProcessEngine::new(&config.engine);
    match engine.locate() {
        Some(path) => info!("Inspection engine: {}", path.display()),
        None => warn!(
            "Inspection engine '{}' not found on PATH; requests will fail until it is installed",
            engine.program().display()
        ),
    }

    hyperlens::serve(&config, Dispatcher::from_engine(engine), shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}
