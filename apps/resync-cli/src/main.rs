//! # resync
//!
//! Pauses, resyncs and resumes app endpoints from the command line.
//!
//! ## Exit Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  0   every deploy and every endpoint succeeded                         │
//! │  1   at least one deploy or endpoint failed                            │
//! │  2   at least one endpoint may be left paused (manual resume needed)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{with_config_hint, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let code = cli.run(cancel).await.map_err(with_config_hint)?;
    std::process::exit(code);
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages, including raw status bodies
/// - `RUST_LOG=resync_engine=trace` - Trace the engine only
/// - Default: INFO level, DEBUG with `--verbose`
fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancels `token` on the first Ctrl+C.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, finishing the current endpoint and resuming it");
            token.cancel();
        }
        Err(e) => info!(error = %e, "Ctrl+C handler unavailable"),
    }
}
