//! Fuzz target for YOLO label row parsing, as used by `validate`.
//!
//! Run with:
//!   cargo +nightly fuzz run yolo_label_line_parse

#![no_main]

use facelabel::ir::io_yolo::parse_label_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }

    let text = String::from_utf8_lossy(data);
    for line in text.lines() {
        let _ = parse_label_line(line);
    }
});
