//! Per-invocation state shared by the one-shot commands.

use hyperlens_engine::{CancellationToken, Dispatcher, ProcessEngine};
use hyperlens_protocol::HyperlensConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Grace period between the first Ctrl-C and a hard exit.
const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

/// Exit code for a command stopped by Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

pub struct CommandContext {
    pub config: HyperlensConfig,
    pub dispatcher: Dispatcher,
    pub cancel: CancellationToken,
}

impl CommandContext {
    pub fn new(config: HyperlensConfig) -> Self {
        let engine = ProcessEngine::new(&config.engine);
        Self {
            config,
            dispatcher: Dispatcher::from_engine(engine),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel the in-flight engine call on Ctrl-C.
    ///
    /// A command blocked outside the engine (waiting at a prompt) cannot see
    /// the token, so the process exits with 130 after a short grace period.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Interrupted, cancelling engine call");
            cancel.cancel();
            tokio::time::sleep(INTERRUPT_GRACE).await;
            eprintln!();
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        });
    }
}
