//! Shared fixtures for the integration tests.
//!
//! Loads the checked-in RSA fixtures, builds hand-made requests whose
//! fields can be altered, and starts servers on ephemeral ports.

use simonctr_core::handshake::{seal_request, sign_agreement};
use simonctr_core::message::{AgreementData, Request, SessionKeyData, canonical_hash};
use simonctr_core::{FrameBuilder, FrameType, KeyRing};
use simonctr_crypto::SessionKey;
use simonctr_crypto::ctr::CtrNonce;
use simonctr_crypto::rsa::{KeyPair, PublicKey};
use simonctr_transport::{
    Server, ServerConfig, TcpFrameTransport, TcpSettings, TransportResult,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SERVER_KEYPAIR: &str = include_str!("fixtures/server_keypair.toml");
const CLIENT_KEYPAIR: &str = include_str!("fixtures/client_keypair.toml");
const CLIENT_PUBLIC: &str = include_str!("fixtures/client_public.toml");

/// Server fixture keypair
pub fn server_keys() -> KeyPair {
    toml::from_str(SERVER_KEYPAIR).expect("server fixture parses")
}

/// Client fixture keypair
pub fn client_keys() -> KeyPair {
    toml::from_str(CLIENT_KEYPAIR).expect("client fixture parses")
}

/// Client fixture public key, as distributed to servers
pub fn client_public() -> PublicKey {
    toml::from_str(CLIENT_PUBLIC).expect("client public fixture parses")
}

/// Responder and initiator key rings for two distinct keypairs
pub fn rings() -> (Arc<KeyRing>, Arc<KeyRing>) {
    let server = server_keys();
    let client = client_keys();
    assert_eq!(client.public(), &client_public());
    let responder = KeyRing::new(server.clone(), client_public());
    let initiator = KeyRing::new(client, server.public().clone());
    (Arc::new(responder), Arc::new(initiator))
}

/// Frame a request message
pub fn frame_request(request: &Request) -> Vec<u8> {
    FrameBuilder::new()
        .frame_type(FrameType::Request)
        .json(request)
        .expect("request serializes")
        .build()
        .expect("request fits in a frame")
}

/// Build a request frame by hand, letting `edit` alter the key data and
/// the agreement data after the honest values are computed.
///
/// The edited key data only influences the agreement through `edit`; the
/// request itself always carries the honest session key and nonce.
pub fn custom_request(
    initiator: &KeyRing,
    edit: impl FnOnce(&mut SessionKeyData, &mut AgreementData),
) -> Vec<u8> {
    let session_key = SessionKey::generate().expect("session key");
    let nonce = CtrNonce::generate();
    let mut key_data = SessionKeyData {
        key: session_key.to_biguint(),
        tod: nonce.as_u128(),
    };
    let mut agreement = AgreementData {
        hash_sess_key: canonical_hash(&key_data).expect("hash"),
        identity: Some("integration".into()),
    };
    edit(&mut key_data, &mut agreement);

    let payload = sign_agreement(initiator.local().private(), agreement).expect("sign");
    frame_request(&seal_request(initiator.peer(), &session_key, nonce, &payload).expect("seal"))
}

/// Server configuration on an ephemeral loopback port
pub fn local_config(max_connections: usize) -> ServerConfig {
    ServerConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_connections,
        read_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    }
}

/// Running server handle
pub struct RunningServer {
    /// Bound address
    pub addr: SocketAddr,
    /// Send `true` to stop accepting
    pub stop: watch::Sender<bool>,
    /// Accept loop task
    pub handle: JoinHandle<TransportResult<()>>,
}

impl RunningServer {
    /// Stop the server and wait for in-flight connections.
    pub async fn shutdown(self) -> TransportResult<()> {
        let _ = self.stop.send(true);
        self.handle.await.expect("server task panicked")
    }
}

/// Bind and start a server.
pub async fn spawn_server(config: ServerConfig, keys: Arc<KeyRing>) -> RunningServer {
    let server = Server::bind(config, keys).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    let (stop, shutdown) = watch::channel(false);
    let handle = tokio::spawn(server.run(shutdown));
    tracing::debug!("Test server on {}", addr);

    RunningServer { addr, stop, handle }
}

/// A connected pair: the accepted side as a frame transport, and the raw
/// client stream.
pub async fn accepted_pair(settings: TcpSettings) -> (TcpFrameTransport, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let client = TcpStream::connect(addr).await.expect("connect");
    let (server, _) = listener.accept().await.expect("accept");
    (
        TcpFrameTransport::from_stream(server, settings).expect("wrap stream"),
        client,
    )
}
