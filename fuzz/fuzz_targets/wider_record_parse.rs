//! Fuzz target for the WIDER FACE record parser.
//!
//! Arbitrary text is split into lines and driven through the record state
//! machine; the parser must terminate without panicking on any input.
//!
//! Run with:
//!   cargo +nightly fuzz run wider_record_parse

#![no_main]

use facelabel::ir::io_wider::fuzz_parse_records;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Ground-truth files are a few MB at most.
    if data.len() > 4 * 1024 * 1024 {
        return;
    }

    let text = String::from_utf8_lossy(data);
    let _ = fuzz_parse_records(&text);
});
