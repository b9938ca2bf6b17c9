//! Fuzz target for the responder
//!
//! Feeds arbitrary request payloads to a responder holding the test keys.
//! Every input must be rejected or answered without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use simonctr_core::{FrameBuilder, FrameType, KeyRing, Responder};
use std::sync::{Arc, OnceLock};

const SERVER_KEYPAIR: &str = include_str!("../../tests/fixtures/server_keypair.toml");

fn keys() -> Arc<KeyRing> {
    static KEYS: OnceLock<Arc<KeyRing>> = OnceLock::new();
    Arc::clone(KEYS.get_or_init(|| {
        Arc::new(KeyRing::single(
            toml::from_str(SERVER_KEYPAIR).expect("fixture parses"),
        ))
    }))
}

fuzz_target!(|data: &[u8]| {
    let mut responder = Responder::new(keys());

    let frame = match FrameBuilder::new()
        .frame_type(FrameType::Request)
        .payload(data)
        .build()
    {
        Ok(frame) => frame,
        Err(_) => return,
    };

    if responder.handle_request(&frame).is_err() {
        assert!(responder.state().is_terminal());
    }
});
