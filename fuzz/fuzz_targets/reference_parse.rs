//! Fuzz target for reference parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run reference_parse

#![no_main]

use hepref::reference::{parse_reference, PartialReference};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_reference(text, &PartialReference::default());

    // Bare resource names resolve against a record context.
    let context = PartialReference {
        reftype: Some("hepdata".to_string()),
        recordid: Some("12345".to_string()),
        recordversion: Some("1".to_string()),
        ..PartialReference::default()
    };
    if let Ok(components) = parse_reference(text, &context) {
        assert!(!components.reftype.is_empty());
        assert!(!components.recordid.is_empty());
    }
});
