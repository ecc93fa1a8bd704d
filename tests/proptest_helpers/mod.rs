#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// An image path as it appears in a ground-truth file.
pub fn arb_image_path() -> BoxedStrategy<String> {
    "[0-9]{1,2}--[A-Za-z_]{1,10}/[0-9a-z_]{1,16}\\.jpg".boxed()
}

/// A well-formed ten-column face row.
pub fn arb_valid_row() -> BoxedStrategy<String> {
    (
        0u32..2000,
        0u32..2000,
        0u32..1000,
        0u32..1000,
        prop::collection::vec(0u32..3, 6),
    )
        .prop_map(|(x, y, w, h, attrs)| {
            let attrs: Vec<String> = attrs.iter().map(u32::to_string).collect();
            format!("{x} {y} {w} {h} {}", attrs.join(" "))
        })
        .boxed()
}

/// A row the box parser rejects: fewer than four numeric geometry columns.
pub fn arb_malformed_row() -> BoxedStrategy<String> {
    prop_oneof![
        "[a-z#!]{1,10}( [0-9a-z]{1,5}){0,5}",
        "[0-9]{1,3}( [0-9]{1,3}){0,2}",
    ]
    .boxed()
}

pub fn arb_row() -> BoxedStrategy<String> {
    prop_oneof![3 => arb_valid_row(), 1 => arb_malformed_row()].boxed()
}

/// A complete record: path plus the rows its count line announces.
pub fn arb_record(max_rows: usize) -> BoxedStrategy<(String, Vec<String>)> {
    (arb_image_path(), prop::collection::vec(arb_row(), 0..=max_rows)).boxed()
}

/// Flattens records into annotation lines.
pub fn to_lines(records: &[(String, Vec<String>)]) -> Vec<String> {
    let mut lines = Vec::new();
    for (path, rows) in records {
        lines.push(path.clone());
        lines.push(rows.len().to_string());
        lines.extend(rows.iter().cloned());
    }
    lines
}
