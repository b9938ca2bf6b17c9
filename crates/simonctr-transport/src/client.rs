//! Initiator-side connection.

use crate::server::ConnectionError;
use crate::tcp::{TcpFrameTransport, TcpSettings};
use crate::transport::{FrameTransport, TransportResult};
use simonctr_core::message::FileHeader;
use simonctr_core::{Initiator, KeyRing};
use simonctr_crypto::SessionKey;
use std::net::SocketAddr;
use std::sync::Arc;

/// Run the initiator side of the handshake over `transport`.
///
/// Returns the responder's verified session key.
///
/// # Errors
///
/// Returns the first transport or handshake failure.
pub async fn initiate<T: FrameTransport>(
    transport: &mut T,
    initiator: &mut Initiator,
) -> Result<SessionKey, ConnectionError> {
    let request = initiator.build_request()?;
    transport.send_frame(&request).await?;

    let response = transport.receive_frame().await?;
    Ok(initiator.finish(&response)?.clone())
}

/// Client connection to a handshake server
#[derive(Debug)]
pub struct Client {
    transport: TcpFrameTransport,
    initiator: Initiator,
}

impl Client {
    /// Connect to `addr`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the server is unreachable.
    pub async fn connect(
        addr: SocketAddr,
        keys: Arc<KeyRing>,
        identity: Option<String>,
        settings: TcpSettings,
    ) -> TransportResult<Self> {
        let transport = TcpFrameTransport::connect(addr, settings).await?;
        let initiator = match identity {
            Some(name) => Initiator::new(keys).with_identity(name),
            None => Initiator::new(keys),
        };
        Ok(Self {
            transport,
            initiator,
        })
    }

    /// Perform the handshake.
    ///
    /// # Errors
    ///
    /// Returns the first transport or handshake failure.
    pub async fn handshake(&mut self) -> Result<SessionKey, ConnectionError> {
        initiate(&mut self.transport, &mut self.initiator).await
    }

    /// Send a file-transfer header after the handshake.
    ///
    /// # Errors
    ///
    /// Returns `HandshakeError::InvalidInitiatorState` before a completed
    /// handshake, or a transport failure.
    pub async fn send_file_header(&mut self, header: &FileHeader) -> Result<(), ConnectionError> {
        let frame = self.initiator.file_header_frame(header)?;
        self.transport.send_frame(&frame).await?;
        Ok(())
    }

    /// Close the connection
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if shutdown fails.
    pub async fn close(mut self) -> TransportResult<()> {
        self.initiator.close();
        self.transport.close().await
    }
}
