//! Session-key handshake.
//!
//! The initiator picks a 256-bit session key and a counter-mode nonce,
//! RSA-encrypts both to the responder, and sends a counter-mode encrypted
//! payload carrying signed agreement data. The responder accepts the key
//! only after the signature and the session-key hash both verify.
//!
//! ## Responder states
//!
//! ```text
//! AwaitRequest → ValidateRequest → DecryptSessionKey → DecryptPayload
//!   → VerifySignature → VerifyHash → BuildResponse → Sent
//!                                  (any failure) → Closed
//! ```
//!
//! Every failure is terminal. A closed responder cannot be reused.

use crate::error::{FrameError, HandshakeError};
use crate::frame::{Frame, FrameBuilder, FrameType};
use crate::message::{
    AgreementData, FileHeader, Request, Response, ResponseKey, ResponseKeyData, SessionKeyData,
    SignedPayload, bytes_to_int, canonical, canonical_hash, int_to_json,
};
use num_bigint::BigUint;
use simonctr_crypto::constant_time::ct_eq_biguint;
use simonctr_crypto::ctr::{CounterStream, CtrCiphertext, CtrNonce};
use simonctr_crypto::rsa::{KeyPair, PrivateKey, PublicKey};
use simonctr_crypto::{CryptoError, SHA3_512_OUTPUT_SIZE, SessionKey};
use std::sync::Arc;

/// Long-lived key material for one side of the handshake.
///
/// `local` decrypts what the peer sends and signs what this side sends.
/// `peer` encrypts to the peer and verifies its signatures.
#[derive(Debug, Clone)]
pub struct KeyRing {
    local: KeyPair,
    peer: PublicKey,
}

impl KeyRing {
    /// Create a key ring
    #[must_use]
    pub fn new(local: KeyPair, peer: PublicKey) -> Self {
        Self { local, peer }
    }

    /// Use one keypair for both roles.
    #[must_use]
    pub fn single(local: KeyPair) -> Self {
        let peer = local.public().clone();
        Self { local, peer }
    }

    /// Local keypair
    #[must_use]
    pub fn local(&self) -> &KeyPair {
        &self.local
    }

    /// Peer public key
    #[must_use]
    pub fn peer(&self) -> &PublicKey {
        &self.peer
    }
}

/// Responder handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the request frame
    AwaitRequest,
    /// Checking framing and message structure
    ValidateRequest,
    /// Recovering the session key with the local private key
    DecryptSessionKey,
    /// Counter-mode decrypting the payload
    DecryptPayload,
    /// Checking the agreement signature against the peer key
    VerifySignature,
    /// Checking the transmitted session-key hash
    VerifyHash,
    /// Building the response frame
    BuildResponse,
    /// Response handed to the transport
    Sent,
    /// Terminal; resources released
    Closed,
}

impl HandshakeState {
    /// Whether no further request can be processed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Closed)
    }

    /// Whether `to` may follow `self`.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        use HandshakeState::{
            AwaitRequest, BuildResponse, Closed, DecryptPayload, DecryptSessionKey, Sent,
            ValidateRequest, VerifyHash, VerifySignature,
        };

        match (self, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (AwaitRequest, ValidateRequest)
            | (ValidateRequest, DecryptSessionKey)
            | (DecryptSessionKey, DecryptPayload)
            | (DecryptPayload, VerifySignature)
            | (VerifySignature, VerifyHash)
            | (VerifyHash, BuildResponse)
            | (BuildResponse, Sent) => true,
            _ => false,
        }
    }
}

fn bit_length_error(err: CryptoError) -> HandshakeError {
    match err {
        CryptoError::BitLengthMismatch { expected, actual } => {
            FrameError::BitLengthMismatch { expected, actual }.into()
        }
        other => HandshakeError::PayloadDecode(other.to_string()),
    }
}

/// Sign agreement data with `signer`.
///
/// # Errors
///
/// Returns [`HandshakeError::Crypto`] if the digest does not fit below the
/// signer's modulus.
pub fn sign_agreement(
    signer: &PrivateKey,
    agreement_data: AgreementData,
) -> Result<SignedPayload, HandshakeError> {
    let digest = canonical_hash(&agreement_data)?;
    let signature = signer.sign(&digest)?;
    Ok(SignedPayload {
        agreement_data,
        signature,
    })
}

/// Encrypt a signed payload and its session key into a request message.
///
/// `session_key` and `nonce` must be fresh for every request.
///
/// # Errors
///
/// Returns [`HandshakeError::Crypto`] if the key structure does not fit
/// below the responder's modulus.
pub fn seal_request(
    responder: &PublicKey,
    session_key: &SessionKey,
    nonce: CtrNonce,
    payload: &SignedPayload,
) -> Result<Request, HandshakeError> {
    let key_data = SessionKeyData {
        key: session_key.to_biguint(),
        tod: nonce.as_u128(),
    };

    let stream = CounterStream::new(session_key)?;
    let ciphertext = stream.encrypt_with_nonce(nonce, &bytes_to_int(&canonical(payload)?))?;
    let sess_key = responder.encrypt(&bytes_to_int(&canonical(&key_data)?))?;

    Ok(Request {
        sess_key,
        payload: ciphertext.to_biguint(),
        payload_bits: ciphertext.bit_len(),
    })
}

/// Responder side of the handshake, one per connection.
#[derive(Debug)]
pub struct Responder {
    keys: Arc<KeyRing>,
    state: HandshakeState,
    peer_key: Option<SessionKey>,
    response_key: Option<SessionKey>,
    peer_identity: Option<String>,
}

impl Responder {
    /// Create a responder awaiting a request
    #[must_use]
    pub fn new(keys: Arc<KeyRing>) -> Self {
        Self {
            keys,
            state: HandshakeState::AwaitRequest,
            peer_key: None,
            response_key: None,
            peer_identity: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Session key accepted from the initiator, once verified
    #[must_use]
    pub fn peer_session_key(&self) -> Option<&SessionKey> {
        self.peer_key.as_ref()
    }

    /// Session key sent back in the response
    #[must_use]
    pub fn response_session_key(&self) -> Option<&SessionKey> {
        self.response_key.as_ref()
    }

    /// Identity claimed in the verified agreement data
    #[must_use]
    pub fn peer_identity(&self) -> Option<&str> {
        self.peer_identity.as_deref()
    }

    /// Release all session material and refuse further use.
    pub fn close(&mut self) {
        if self.state != HandshakeState::Closed {
            tracing::debug!("Handshake state transition: {:?} -> Closed", self.state);
        }
        self.state = HandshakeState::Closed;
        self.peer_key = None;
        self.response_key = None;
    }

    /// Process a request frame and return the response frame.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidState`] unless awaiting a request.
    /// Any other error closes the responder.
    pub fn handle_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        if self.state != HandshakeState::AwaitRequest {
            return Err(HandshakeError::InvalidState(self.state));
        }

        match self.process_request(frame) {
            Ok(response) => {
                self.advance(HandshakeState::Sent)?;
                tracing::info!(
                    "Handshake complete (identity: {})",
                    self.peer_identity.as_deref().unwrap_or("<none>")
                );
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), state = ?self.state, "Handshake rejected");
                self.close();
                Err(e)
            }
        }
    }

    /// Accept the file-transfer header that follows a completed handshake.
    ///
    /// The responder closes afterwards, whether or not the header is valid.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidState`] unless the response was sent,
    /// or [`HandshakeError::Framing`] for anything but a well-formed type
    /// `'3'` frame holding a JSON object.
    pub fn accept_file_header(&mut self, frame: &[u8]) -> Result<FileHeader, HandshakeError> {
        if self.state != HandshakeState::Sent {
            return Err(HandshakeError::InvalidState(self.state));
        }

        let result = Frame::parse_expecting(frame, FrameType::FileHeader)
            .and_then(|f| f.json::<FileHeader>())
            .map_err(HandshakeError::from);

        if let Err(e) = &result {
            tracing::warn!(kind = e.kind(), "File header rejected");
        }
        self.close();
        result
    }

    fn advance(&mut self, next: HandshakeState) -> Result<(), HandshakeError> {
        if !self.state.can_transition(next) {
            return Err(HandshakeError::InvalidState(self.state));
        }
        tracing::debug!("Handshake state transition: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn process_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        self.advance(HandshakeState::ValidateRequest)?;
        let request: Request = Frame::parse_expecting(frame, FrameType::Request)?.json()?;
        let ciphertext = CtrCiphertext::from_biguint(&request.payload, request.payload_bits)
            .map_err(bit_length_error)?;

        self.advance(HandshakeState::DecryptSessionKey)?;
        let key_data = self.recover_session_key(&request.sess_key)?;
        let session_key = SessionKey::from_biguint(&key_data.key)
            .map_err(|e| HandshakeError::KeyRecovery(e.to_string()))?;

        self.advance(HandshakeState::DecryptPayload)?;
        let payload = Self::decrypt_payload(&session_key, &key_data, &ciphertext)?;

        self.advance(HandshakeState::VerifySignature)?;
        let digest = canonical_hash(&payload.agreement_data)?;
        self.keys
            .peer()
            .verify(&digest, &payload.signature)
            .map_err(|_| HandshakeError::SignatureInvalid)?;

        self.advance(HandshakeState::VerifyHash)?;
        let expected = canonical_hash(&key_data)?;
        if !ct_eq_biguint(
            &expected,
            &payload.agreement_data.hash_sess_key,
            SHA3_512_OUTPUT_SIZE,
        ) {
            return Err(HandshakeError::SessionKeyHashMismatch);
        }

        self.peer_key = Some(session_key);
        self.peer_identity = payload.agreement_data.identity;

        self.advance(HandshakeState::BuildResponse)?;
        self.build_response()
    }

    fn recover_session_key(&self, sess_key: &BigUint) -> Result<SessionKeyData, HandshakeError> {
        let plain = self
            .keys
            .local()
            .private()
            .decrypt(sess_key)
            .map_err(|e| HandshakeError::KeyRecovery(e.to_string()))?;
        int_to_json(&plain).map_err(HandshakeError::KeyRecovery)
    }

    fn decrypt_payload(
        session_key: &SessionKey,
        key_data: &SessionKeyData,
        ciphertext: &CtrCiphertext,
    ) -> Result<SignedPayload, HandshakeError> {
        let stream = CounterStream::new(session_key)?;
        let plain = stream
            .decrypt(CtrNonce::from_u128(key_data.tod), ciphertext)
            .map_err(|e| HandshakeError::PayloadDecode(e.to_string()))?;
        int_to_json(&plain).map_err(HandshakeError::PayloadDecode)
    }

    fn build_response(&mut self) -> Result<Vec<u8>, HandshakeError> {
        let fresh = SessionKey::generate()?;
        let key_data = ResponseKeyData {
            key: fresh.to_biguint(),
        };

        let response = Response {
            sess_key: ResponseKey {
                key: self.keys.peer().encrypt(&bytes_to_int(&canonical(&key_data)?))?,
                hash_sess_key: canonical_hash(&key_data)?,
            },
        };
        self.response_key = Some(fresh);

        Ok(FrameBuilder::new()
            .frame_type(FrameType::Response)
            .json(&response)?
            .build()?)
    }
}

/// Initiator handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    /// No request built yet
    Idle,
    /// Request built, awaiting the response
    RequestSent,
    /// Response verified
    Complete,
    /// Terminal; resources released
    Closed,
}

/// Initiator side of the handshake.
#[derive(Debug)]
pub struct Initiator {
    keys: Arc<KeyRing>,
    identity: Option<String>,
    state: InitiatorState,
    session_key: Option<SessionKey>,
    response_key: Option<SessionKey>,
}

impl Initiator {
    /// Create an initiator
    #[must_use]
    pub fn new(keys: Arc<KeyRing>) -> Self {
        Self {
            keys,
            identity: None,
            state: InitiatorState::Idle,
            session_key: None,
            response_key: None,
        }
    }

    /// Name to send in the agreement data
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> InitiatorState {
        self.state
    }

    /// Session key sent in the request
    #[must_use]
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Session key received in the verified response
    #[must_use]
    pub fn response_session_key(&self) -> Option<&SessionKey> {
        self.response_key.as_ref()
    }

    /// Release all session material and refuse further use.
    pub fn close(&mut self) {
        self.state = InitiatorState::Closed;
        self.session_key = None;
        self.response_key = None;
    }

    /// Build the request frame under a fresh session key and nonce.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidState`] unless idle, or a crypto error
    /// if the key material is too small for the messages.
    pub fn build_request(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.state != InitiatorState::Idle {
            return Err(HandshakeError::InvalidInitiatorState(self.state));
        }

        let session_key = SessionKey::generate()?;
        let nonce = CtrNonce::generate();

        let key_data = SessionKeyData {
            key: session_key.to_biguint(),
            tod: nonce.as_u128(),
        };
        let agreement_data = AgreementData {
            hash_sess_key: canonical_hash(&key_data)?,
            identity: self.identity.clone(),
        };

        let payload = sign_agreement(self.keys.local().private(), agreement_data)?;
        let request = seal_request(self.keys.peer(), &session_key, nonce, &payload)?;
        let frame = FrameBuilder::new()
            .frame_type(FrameType::Request)
            .json(&request)?
            .build()?;

        tracing::debug!("Built request frame ({} bytes)", frame.len());
        self.session_key = Some(session_key);
        self.state = InitiatorState::RequestSent;
        Ok(frame)
    }

    /// Verify the response frame and return the responder's session key.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidState`] unless a request was built.
    /// Any other error closes the initiator.
    pub fn finish(&mut self, frame: &[u8]) -> Result<&SessionKey, HandshakeError> {
        if self.state != InitiatorState::RequestSent {
            return Err(HandshakeError::InvalidInitiatorState(self.state));
        }

        match self.verify_response(frame) {
            Ok(key) => {
                self.state = InitiatorState::Complete;
                Ok(&*self.response_key.insert(key))
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Response rejected");
                self.close();
                Err(e)
            }
        }
    }

    /// Frame a file-transfer header after a completed handshake.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidState`] before completion.
    pub fn file_header_frame(&self, header: &FileHeader) -> Result<Vec<u8>, HandshakeError> {
        if self.state != InitiatorState::Complete {
            return Err(HandshakeError::InvalidInitiatorState(self.state));
        }
        Ok(FrameBuilder::new()
            .frame_type(FrameType::FileHeader)
            .json(header)?
            .build()?)
    }

    fn verify_response(&self, frame: &[u8]) -> Result<SessionKey, HandshakeError> {
        let response: Response = Frame::parse_expecting(frame, FrameType::Response)?.json()?;

        let plain = self
            .keys
            .local()
            .private()
            .decrypt(&response.sess_key.key)
            .map_err(|e| HandshakeError::KeyRecovery(e.to_string()))?;
        let key_data: ResponseKeyData = int_to_json(&plain).map_err(HandshakeError::KeyRecovery)?;

        let expected = canonical_hash(&key_data)?;
        if !ct_eq_biguint(
            &expected,
            &response.sess_key.hash_sess_key,
            SHA3_512_OUTPUT_SIZE,
        ) {
            return Err(HandshakeError::SessionKeyHashMismatch);
        }

        SessionKey::from_biguint(&key_data.key)
            .map_err(|e| HandshakeError::KeyRecovery(e.to_string()))
    }
}
