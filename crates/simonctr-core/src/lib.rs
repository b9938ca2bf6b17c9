//! # simonctr Core
//!
//! Wire protocol and handshake state machine for simonctr.
//!
//! This crate provides:
//! - Frame encoding and decoding (borrowed parsing)
//! - Typed JSON handshake messages with canonical serialization
//! - Responder and initiator handshake state machines
//! - Error types and handling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Handshake                                 │
//! │   (RSA key transport, signature + hash checks, CTR payload)     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        Messages                                  │
//! │   (request / response / file header, decimal big integers)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        Frames                                    │
//! │   (type digit, 8-digit length, UTF-8 payload)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All operations are synchronous. Transports live in `simonctr-transport`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;

pub use error::{Error, FrameError, HandshakeError};
pub use frame::{Frame, FrameBuilder, FrameType};
pub use handshake::{HandshakeState, Initiator, InitiatorState, KeyRing, Responder};

/// Frame header size: one type digit plus an eight-digit length
pub const FRAME_HEADER_SIZE: usize = 9;

/// Largest payload an eight-digit length can announce
pub const MAX_PAYLOAD_LEN: usize = 99_999_999;
