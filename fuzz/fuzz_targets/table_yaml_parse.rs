//! Fuzz target for table documents.
//!
//! Feeds arbitrary text through the YAML table reader and the value
//! conversion, looking for panics rather than errors.
//!
//! Run with:
//!   cargo +nightly fuzz run table_yaml_parse

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Table files are small; skip anything that would only exercise the allocator.
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = hepref::model::fuzz_convert_table(text);
});
