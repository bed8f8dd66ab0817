//! line-echo: a line-oriented TCP echo server
//!
//! Every `\n`-terminated line a client sends is written straight back.
//!
//! Features:
//! - Per-line echo with immediate flush
//! - Optional per-connection transcript (`--mode accumulate`)
//! - Pluggable framing (`--framing line|length`)
//! - Graceful shutdown on SIGINT/SIGTERM through a signal-triggered callback
//! - Configuration via CLI arguments or TOML file

use line_echo::config::Config;
use line_echo::server::Server;
use line_echo::signal;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        max_line_length = config.max_line_length,
        mode = ?config.mode,
        framing = ?config.framing,
        "Starting line-echo server"
    );

    let shutdown = CancellationToken::new();

    // OS signal -> one-shot notification -> cancel the server.
    let (signal_tx, signal_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                info!(signal = name, "Received shutdown signal");
                let _ = signal_tx.send(());
            }
            Err(e) => {
                // Dropping the sender would read as a signal; keep serving.
                error!(error = %e, "Failed to listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        }
    });

    let waiter_cancel = CancellationToken::new();
    let waiter = signal::poll_channel_with_cancel(signal_rx, waiter_cancel.clone(), {
        let shutdown = shutdown.clone();
        move || shutdown.cancel()
    });

    let result = Server::new(config).run(shutdown).await;

    // The server may stop without a signal (e.g. bind failure).
    waiter_cancel.cancel();
    if let Err(e) = waiter.await {
        warn!(error = %e, "Signal waiter failed");
    }

    result?;
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that was received.
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
