//! TCP frame transport using Tokio.
//!
//! Reads the fixed 9-byte header first, checks the announced length
//! against the configured limit, then reads exactly that many payload
//! bytes. Every read is bounded by the read timeout.

use crate::transport::{FrameTransport, TransportError, TransportResult, TransportStats};
use async_trait::async_trait;
use simonctr_core::FRAME_HEADER_SIZE;
use simonctr_core::frame::parse_header;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default maximum frame length (header included)
pub const DEFAULT_MAX_FRAME_LEN: usize = 32_000;

/// Default read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct TcpSettings {
    /// Largest accepted frame, header included
    pub max_frame_len: usize,
    /// Upper bound on each read
    pub read_timeout: Duration,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Frame transport over a single TCP connection.
#[derive(Debug)]
pub struct TcpFrameTransport {
    stream: TcpStream,
    peer: SocketAddr,
    settings: TcpSettings,
    closed: bool,
    stats: TransportStats,
}

impl TcpFrameTransport {
    /// Wrap an accepted stream.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the peer address cannot be read.
    pub fn from_stream(stream: TcpStream, settings: TcpSettings) -> TransportResult<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            settings,
            closed: false,
            stats: TransportStats::new(),
        })
    }

    /// Connect to a remote peer.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the connection cannot be
    /// established.
    pub async fn connect(addr: SocketAddr, settings: TcpSettings) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{addr}: {e}")))?;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to {}", addr);
        Self::from_stream(stream, settings)
    }

    /// Connection limits in effect
    #[must_use]
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    async fn read_exact_timed(&mut self, buf: &mut [u8]) -> TransportResult<()> {
        let limit = self.settings.read_timeout;
        match timeout(limit, self.stream.read_exact(buf)).await {
            Err(_) => Err(TransportError::Timeout(limit)),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.closed = true;
                Err(TransportError::Closed)
            }
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait]
impl FrameTransport for TcpFrameTransport {
    async fn receive_frame(&mut self) -> TransportResult<Vec<u8>> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.read_exact_timed(&mut header).await?;

        let (_, payload_len) = parse_header(&header)?;
        let total = FRAME_HEADER_SIZE + payload_len;
        if total > self.settings.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len: total,
                max: self.settings.max_frame_len,
            });
        }

        let mut frame = vec![0u8; total];
        frame[..FRAME_HEADER_SIZE].copy_from_slice(&header);
        self.read_exact_timed(&mut frame[FRAME_HEADER_SIZE..]).await?;

        self.stats.record_recv(total);
        tracing::trace!("Received {} byte frame from {}", total, self.peer);
        Ok(frame)
    }

    async fn send_frame(&mut self, frame: &[u8]) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        self.stream.write_all(frame).await?;
        self.stream.flush().await?;

        self.stats.record_send(frame.len());
        tracing::trace!("Sent {} byte frame to {}", frame.len(), self.peer);
        Ok(())
    }

    fn peer_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.peer)
    }

    async fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown().await {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
