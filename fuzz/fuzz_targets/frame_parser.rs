//! Fuzz target for frame parsing
//!
//! Tests that the frame parser correctly handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use simonctr_core::frame::parse_header;
use simonctr_core::{FRAME_HEADER_SIZE, Frame, FrameBuilder};

fuzz_target!(|data: &[u8]| {
    // The parser should never panic, only return Ok or Err
    if let Ok(frame) = Frame::parse(data) {
        // Anything that parses rebuilds to the same bytes
        let rebuilt = FrameBuilder::new()
            .frame_type(frame.frame_type())
            .payload(frame.payload().as_bytes())
            .build()
            .expect("parsed payload fits");
        assert_eq!(rebuilt, data);
    }

    // Header-only path used by the transport
    if let Some(header) = data.first_chunk::<FRAME_HEADER_SIZE>() {
        let _ = parse_header(header);
    }
});
