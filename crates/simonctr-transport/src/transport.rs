//! Frame transport abstraction.
//!
//! This module defines the `FrameTransport` trait that moves whole protocol
//! frames between peers. The handshake engine never touches sockets; it
//! only sees complete frames handed over by a transport.

use async_trait::async_trait;
use simonctr_core::FrameError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport is closed
    #[error("Transport is closed")]
    Closed,

    /// Address binding failed
    #[error("Failed to bind to address: {0}")]
    BindFailed(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame header could not be parsed
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Announced frame exceeds the configured limit
    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Total frame length announced by the header
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Peer sent nothing within the read timeout
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Async transport for whole protocol frames.
///
/// # Examples
///
/// ```no_run
/// use simonctr_transport::transport::FrameTransport;
/// use simonctr_transport::tcp::{TcpFrameTransport, TcpSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let addr = "127.0.0.1:5150".parse()?;
/// let mut transport = TcpFrameTransport::connect(addr, TcpSettings::default()).await?;
///
/// transport.send_frame(b"300000002{}").await?;
/// let reply = transport.receive_frame().await?;
/// println!("Received {} bytes", reply.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FrameTransport: Send {
    /// Receive one complete frame, header included.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the peer closes, times out, announces a
    /// malformed or oversized header, or the read fails.
    async fn receive_frame(&mut self) -> TransportResult<Vec<u8>>;

    /// Send one complete frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the transport is closed or the write fails.
    async fn send_frame(&mut self, frame: &[u8]) -> TransportResult<()>;

    /// Get the remote address.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the address cannot be determined.
    fn peer_addr(&self) -> TransportResult<SocketAddr>;

    /// Close the transport.
    ///
    /// After calling this method, all subsequent operations should
    /// return `TransportError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if shutting down the connection fails.
    async fn close(&mut self) -> TransportResult<()>;

    /// Check if the transport is closed.
    fn is_closed(&self) -> bool;

    /// Get transport statistics.
    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Frames sent
    pub frames_sent: u64,
    /// Frames received
    pub frames_received: u64,
}

impl TransportStats {
    /// Create new empty statistics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent frame
    pub fn record_send(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.frames_sent += 1;
    }

    /// Record a received frame
    pub fn record_recv(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.frames_received += 1;
    }
}
