//! Fuzz testing for token and cookie handling.
//!
//! Everything the gateway parses before deciding whether to forward a request
//! comes from the caller: the cookie header, the token inside it, and the
//! request path. This target feeds arbitrary bytes to each of those parsers
//! and checks that they never panic.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the token fuzz target
//! cargo +nightly fuzz run fuzz_token
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_token -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `TokenValidator::validate` / `verify`: compact JWS parsing and claim decoding
//! - `extract_token`: cookie header parsing
//! - `ExemptionList::parse` / `is_exempt`, `has_dot_segments`: path matching

#![no_main]

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderValue, header};
use identity_gateway::middleware::{ExemptionList, extract_token, has_dot_segments};
use identity_gateway::token::{IdentityVariant, SecretKey, TokenValidator};
use libfuzzer_sys::fuzz_target;

static VALIDATORS: LazyLock<[TokenValidator; 2]> = LazyLock::new(|| {
    let secret = SecretKey::new("fuzzing-secret-that-is-at-least-32-bytes").unwrap();
    [
        TokenValidator::new(&secret, IdentityVariant::PartnerId, 0),
        TokenValidator::new(&secret, IdentityVariant::UserId, 30),
    ]
});

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Token parsing (shouldn't panic, whatever the outcome)
        for validator in VALIDATORS.iter() {
            let valid = validator.validate(s);
            let verified = validator.verify(s);
            assert!(valid || verified.is_err());
        }

        // Exemption configuration and matching
        let exemptions = ExemptionList::parse(s);
        let _ = exemptions.is_exempt(s);
        let _ = exemptions.is_exempt("/api/orders");
        let _ = has_dot_segments(s);
    }

    // Cookie parsing on raw header bytes
    if let Ok(value) = HeaderValue::from_bytes(data) {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, value);
        let token = extract_token(&headers, "jwt");
        for validator in VALIDATORS.iter() {
            let _ = validator.verify(&token);
        }
    }
});
