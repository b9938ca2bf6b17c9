//! Task-per-connection handshake server.
//!
//! The accept loop waits for a connection slot before each accept, so at
//! most `max_connections` handshakes run at once and further peers queue
//! in the listen backlog. Each accepted connection gets its own task and
//! its own [`Responder`]; the key ring is shared read-only.

use crate::tcp::{DEFAULT_MAX_FRAME_LEN, DEFAULT_READ_TIMEOUT, TcpFrameTransport, TcpSettings};
use crate::transport::{FrameTransport, TransportError, TransportResult};
use simonctr_core::message::FileHeader;
use simonctr_core::{HandshakeError, KeyRing, Responder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5150";

/// Default number of concurrent connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: SocketAddr,
    /// Concurrent connection limit
    pub max_connections: usize,
    /// Upper bound on each read
    pub read_timeout: Duration,
    /// Largest accepted frame, header included
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5150)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Validate limits.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` for a zero connection limit,
    /// a zero timeout, or a frame limit that cannot hold a header.
    pub fn validate(&self) -> TransportResult<()> {
        if self.max_connections == 0 {
            return Err(TransportError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "read_timeout must be non-zero".into(),
            ));
        }
        if self.max_frame_len <= simonctr_core::FRAME_HEADER_SIZE {
            return Err(TransportError::InvalidConfig(format!(
                "max_frame_len must exceed {} bytes",
                simonctr_core::FRAME_HEADER_SIZE
            )));
        }
        Ok(())
    }

    /// Per-connection limits
    #[must_use]
    pub fn tcp_settings(&self) -> TcpSettings {
        TcpSettings {
            max_frame_len: self.max_frame_len,
            read_timeout: self.read_timeout,
        }
    }
}

/// Connection-level failures
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Handshake rejected
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Blocking handshake worker panicked or was cancelled
    #[error("handshake worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ConnectionError {
    /// Short, stable name of the failure kind, safe to log.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::Timeout(_)) => "timeout",
            Self::Transport(TransportError::Closed) => "closed",
            Self::Transport(_) => "transport",
            Self::Handshake(e) => e.kind(),
            Self::Worker(_) => "worker",
        }
    }
}

/// Result of a completed connection
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    /// Identity from the verified agreement data
    pub identity: Option<String>,
    /// File header, if the peer sent one
    pub file_header: Option<FileHeader>,
}

/// Drive one responder over one transport.
///
/// Receives the request, sends the response, then accepts an optional
/// file header. A peer that closes after the response completes normally.
///
/// # Errors
///
/// Returns the first transport or handshake failure. Nothing is sent to the
/// peer on failure.
pub async fn serve_connection<T: FrameTransport>(
    transport: &mut T,
    keys: Arc<KeyRing>,
) -> Result<SessionOutcome, ConnectionError> {
    let request = transport.receive_frame().await?;
    let (mut responder, response) = respond(Responder::new(keys), request).await?;
    transport.send_frame(&response).await?;

    let mut outcome = SessionOutcome {
        identity: responder.peer_identity().map(str::to_owned),
        file_header: None,
    };

    match transport.receive_frame().await {
        Ok(frame) => outcome.file_header = Some(responder.accept_file_header(&frame)?),
        Err(TransportError::Closed) => responder.close(),
        Err(e) => {
            responder.close();
            return Err(e.into());
        }
    }

    Ok(outcome)
}

/// Run the RSA and counter-mode work for one request on the blocking pool.
async fn respond(
    mut responder: Responder,
    request: Vec<u8>,
) -> Result<(Responder, Vec<u8>), ConnectionError> {
    let (responder, response) = tokio::task::spawn_blocking(move || {
        let response = responder.handle_request(&request);
        (responder, response)
    })
    .await?;
    Ok((responder, response?))
}

/// Handshake server
pub struct Server {
    config: ServerConfig,
    keys: Arc<KeyRing>,
    listener: TcpListener,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` for bad limits or
    /// `TransportError::BindFailed` if the address cannot be bound.
    pub async fn bind(config: ServerConfig, keys: Arc<KeyRing>) -> TransportResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{}: {e}", config.listen_addr)))?;

        Ok(Self {
            config,
            keys,
            listener,
        })
    }

    /// Address actually bound
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the socket address cannot be read.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` becomes `true` or its sender is
    /// dropped, then wait for in-flight connections to finish.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the listener fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> TransportResult<()> {
        let limit = Arc::new(Semaphore::new(self.config.max_connections));
        let settings = self.config.tcp_settings();
        let mut tasks = JoinSet::new();

        tracing::info!(
            "Listening on {} (max {} connections)",
            self.local_addr()?,
            self.config.max_connections
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&limit).acquire_owned() => {
                    permit.map_err(|_| TransportError::Closed)?
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let keys = Arc::clone(&self.keys);
            tasks.spawn(async move {
                let _permit = permit;
                let mut transport = match TcpFrameTransport::from_stream(stream, settings) {
                    Ok(transport) => transport,
                    Err(e) => {
                        tracing::warn!("Dropping connection from {}: {}", peer, e);
                        return;
                    }
                };

                tracing::debug!("Connection from {}", peer);
                match serve_connection(&mut transport, keys).await {
                    Ok(outcome) => tracing::info!(
                        "Session with {} complete (identity: {}, file header: {})",
                        peer,
                        outcome.identity.as_deref().unwrap_or("<none>"),
                        outcome.file_header.is_some()
                    ),
                    Err(e) => tracing::warn!(kind = e.kind(), "Connection from {} failed", peer),
                }
                if let Err(e) = transport.close().await {
                    tracing::debug!("Close of connection from {} failed: {}", peer, e);
                }
            });

            while tasks.try_join_next().is_some() {}
        }

        tracing::info!("Shutting down, waiting for {} connections", tasks.len());
        while tasks.join_next().await.is_some() {}
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
