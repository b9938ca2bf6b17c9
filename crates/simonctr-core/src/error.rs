//! Error types for the simonctr handshake protocol.

use crate::frame::FrameType;
use thiserror::Error;

/// Core protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// Frame parsing error
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Handshake error
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Cryptographic error
    #[error("crypto error: {0}")]
    Crypto(#[from] simonctr_crypto::CryptoError),
}

/// Frame-level errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame too short to hold a header
    #[error("frame too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Type digit is not a known frame type
    #[error("invalid frame type: 0x{0:02X}")]
    InvalidType(u8),

    /// Known frame type, but not the one this stage accepts
    #[error("unexpected frame type: expected {expected}, got {actual}")]
    UnexpectedType {
        /// Type the current stage accepts
        expected: FrameType,
        /// Type received
        actual: FrameType,
    },

    /// Length field is not eight decimal digits
    #[error("invalid length field: {0:?}")]
    InvalidLength(String),

    /// Payload byte count differs from the length field
    #[error("length mismatch: header says {declared}, payload has {actual}")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Payload is not UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Payload is not the expected structured message
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Payload exceeds what the length field can express
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),

    /// Declared bit length does not fit the ciphertext
    #[error("ciphertext bit length mismatch: declared {expected}, got {actual}")]
    BitLengthMismatch {
        /// Declared width
        expected: u64,
        /// Width present
        actual: u64,
    },
}

/// Handshake failures.
///
/// Every variant is terminal for the connection. None of them is reported
/// back to the peer.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Framing or message structure violation
    #[error("framing error: {0}")]
    Framing(#[from] FrameError),

    /// Session key could not be recovered from its RSA ciphertext
    #[error("session key recovery failed: {0}")]
    KeyRecovery(String),

    /// Payload could not be decrypted or decoded
    #[error("payload decode failed: {0}")]
    PayloadDecode(String),

    /// Agreement data signature did not verify
    #[error("signature invalid")]
    SignatureInvalid,

    /// Transmitted session-key hash differs from the recovered key's hash
    #[error("session key hash mismatch")]
    SessionKeyHashMismatch,

    /// Operation not valid in the current state
    #[error("invalid handshake state: {0:?}")]
    InvalidState(crate::handshake::HandshakeState),

    /// Initiator operation not valid in the current state
    #[error("invalid initiator state: {0:?}")]
    InvalidInitiatorState(crate::handshake::InitiatorState),

    /// Local cryptographic failure
    #[error("crypto error: {0}")]
    Crypto(#[from] simonctr_crypto::CryptoError),
}

impl HandshakeError {
    /// Short, stable name of the failure kind, safe to log.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::KeyRecovery(_) => "key_recovery",
            Self::PayloadDecode(_) => "payload_decode",
            Self::SignatureInvalid => "signature_invalid",
            Self::SessionKeyHashMismatch => "session_key_hash_mismatch",
            Self::InvalidState(_) | Self::InvalidInitiatorState(_) => "invalid_state",
            Self::Crypto(_) => "crypto",
        }
    }
}
