//! Fuzz target for audit configuration parsing.
//!
//! Parsing plus validation must return an error for bad input, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sa_config::AuditConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = AuditConfig::parse_json(text);
    }
});
