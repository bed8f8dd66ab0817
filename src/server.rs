//! TCP server for echo connections.
//!
//! Accepts incoming connections and runs the echo handler on each one
//! until shutdown is requested.

use crate::config::Config;
use crate::protocols::echo::{handle_connection, EchoOptions};
use crate::signal;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{0}': {1}")]
    InvalidAddress(String, #[source] AddrParseError),
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Server instance
pub struct Server {
    config: Config,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let permits = config.max_connections.clamp(1, Semaphore::MAX_PERMITS);
        let connection_limit = Arc::new(Semaphore::new(permits));
        Server {
            config,
            connection_limit,
        }
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr: SocketAddr = self
            .config
            .listen
            .parse()
            .map_err(|e| ServerError::InvalidAddress(self.config.listen.clone(), e))?;
        let listener = create_listener(addr).map_err(|e| ServerError::Bind(addr, e))?;
        Ok(TcpListener::from_std(listener)?)
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` is cancelled.
    ///
    /// On shutdown the accept loop stops, in-flight connections are
    /// dropped (which closes their streams) and their tasks are drained
    /// before returning.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Server listening");

        let _notice = signal::after_cancel(shutdown.clone(), || {
            info!("Shutdown requested, no longer accepting connections");
        });

        let options = EchoOptions::from(&self.config);
        let mut connections = JoinSet::new();

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = self.connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        tokio::select! {
                            summary = handle_connection(stream, options) => {
                                debug!(
                                    peer = %addr,
                                    lines = summary.lines,
                                    bytes = summary.bytes,
                                    reason = ?summary.close_reason,
                                    transcript_len = summary.transcript.as_ref().map(|t| t.len()),
                                    "Connection closed"
                                );
                            }
                            _ = shutdown.cancelled() => {
                                debug!(peer = %addr, "Connection dropped on shutdown");
                            }
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }

            while let Some(result) = connections.try_join_next() {
                if let Err(e) = result {
                    warn!(error = %e, "Connection task failed");
                }
            }
        }

        let in_flight = connections.len();
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Connection task failed");
            }
        }

        info!(in_flight, "Server stopped");
        Ok(())
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
