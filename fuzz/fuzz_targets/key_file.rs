//! Fuzz target for key file parsing
//!
//! Tests that malformed key files are rejected without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use simonctr_crypto::rsa::{KeyPair, PublicKey};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = toml::from_str::<PublicKey>(s);
        let _ = toml::from_str::<KeyPair>(s);
    }
});
