//! # simonctr Transport
//!
//! Network transport layer for the simonctr handshake.
//!
//! This crate provides:
//! - `FrameTransport` trait for whole-frame I/O
//! - TCP implementation with read timeouts and frame size limits
//! - Task-per-connection server with a connection limit and graceful shutdown
//! - Client helper driving the initiator side

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod server;
pub mod tcp;
pub mod transport;

pub use client::Client;
pub use server::{ConnectionError, Server, ServerConfig, SessionOutcome};
pub use tcp::{TcpFrameTransport, TcpSettings};
pub use transport::{FrameTransport, TransportError, TransportResult};
