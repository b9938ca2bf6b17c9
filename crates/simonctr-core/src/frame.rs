//! Frame encoding and decoding for the simonctr wire protocol.
//!
//! Every message is a single frame:
//!
//! ```text
//! ┌──────┬──────────────────┬──────────────────────────────┐
//! │ type │ length           │ payload                      │
//! │ 1 B  │ 8 ASCII digits   │ exactly `length` UTF-8 bytes │
//! └──────┴──────────────────┴──────────────────────────────┘
//! ```
//!
//! The type is an ASCII digit and the length is zero-padded decimal.
//! Parsing borrows from the input buffer.

use crate::error::FrameError;
use crate::{FRAME_HEADER_SIZE, MAX_PAYLOAD_LEN};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Client handshake request
    Request = b'1',
    /// Server handshake response
    Response = b'2',
    /// File-transfer header following a completed handshake
    FileHeader = b'3',
}

impl FrameType {
    /// ASCII type digit
    #[must_use]
    pub fn as_digit(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'1' => Ok(Self::Request),
            b'2' => Ok(Self::Response),
            b'3' => Ok(Self::FileHeader),
            _ => Err(FrameError::InvalidType(value)),
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'", char::from(self.as_digit()))
    }
}

/// Parse the fixed 9-byte header.
///
/// Returns the frame type and the payload length it announces. Transports
/// use this to know how many payload bytes to read.
///
/// # Errors
///
/// Returns [`FrameError::InvalidType`] or [`FrameError::InvalidLength`].
pub fn parse_header(header: &[u8; FRAME_HEADER_SIZE]) -> Result<(FrameType, usize), FrameError> {
    let frame_type = FrameType::try_from(header[0])?;
    let digits = &header[1..];

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidLength(
            String::from_utf8_lossy(digits).into_owned(),
        ));
    }

    let len = digits
        .iter()
        .fold(0usize, |acc, &d| acc * 10 + usize::from(d - b'0'));

    Ok((frame_type, len))
}

/// Borrowed view of a parsed frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    frame_type: FrameType,
    payload: &'a str,
}

impl<'a> Frame<'a> {
    /// Parse a complete frame.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the buffer is shorter than a header, the
    /// type digit is unknown, the length field is not numeric, the payload
    /// length disagrees with the header, or the payload is not UTF-8.
    pub fn parse(data: &'a [u8]) -> Result<Self, FrameError> {
        let Some((header, payload)) = data.split_first_chunk::<FRAME_HEADER_SIZE>() else {
            return Err(FrameError::TooShort {
                expected: FRAME_HEADER_SIZE,
                actual: data.len(),
            });
        };

        let (frame_type, declared) = parse_header(header)?;

        if declared != payload.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        let payload = std::str::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;

        Ok(Self {
            frame_type,
            payload,
        })
    }

    /// Parse a frame and require a specific type.
    ///
    /// # Errors
    ///
    /// As [`Frame::parse`], plus [`FrameError::UnexpectedType`].
    pub fn parse_expecting(data: &'a [u8], expected: FrameType) -> Result<Self, FrameError> {
        let frame = Self::parse(data)?;
        if frame.frame_type != expected {
            return Err(FrameError::UnexpectedType {
                expected,
                actual: frame.frame_type,
            });
        }
        Ok(frame)
    }

    /// Get the frame type
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Get the payload text
    #[must_use]
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Decode the payload as a JSON message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidPayload`] if the payload does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        serde_json::from_str(self.payload).map_err(|e| FrameError::InvalidPayload(e.to_string()))
    }
}

/// Builder for outgoing frames
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    frame_type: FrameType,
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Create a new frame builder for a request frame with no payload
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_type: FrameType::Request,
            payload: Vec::new(),
        }
    }

    /// Set frame type
    #[must_use]
    pub fn frame_type(mut self, ft: FrameType) -> Self {
        self.frame_type = ft;
        self
    }

    /// Set raw payload
    #[must_use]
    pub fn payload(mut self, data: &[u8]) -> Self {
        self.payload = data.to_vec();
        self
    }

    /// Set the payload to the compact JSON encoding of `message`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidPayload`] if serialization fails.
    pub fn json<T: Serialize>(mut self, message: &T) -> Result<Self, FrameError> {
        self.payload =
            serde_json::to_vec(message).map_err(|e| FrameError::InvalidPayload(e.to_string()))?;
        Ok(self)
    }

    /// Build the frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the payload length needs more than
    /// eight digits.
    pub fn build(self) -> Result<Vec<u8>, FrameError> {
        let len = self.payload.len();
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::TooLarge(len));
        }

        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + len);
        buf.push(self.frame_type.as_digit());
        buf.extend_from_slice(format!("{len:08}").as_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
