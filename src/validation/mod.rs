//! Validation of a converted YOLO face dataset.
//!
//! Checks that a dataset root is usable by training tools:
//! - the manifest parses and its class count matches its names
//! - every image has a label file with the same stem, and vice versa
//! - every label row is well formed, uses a known class, and stays in `[0, 1]`

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FacelabelError;
use crate::ir::io_yolo::{
    collect_files_with_extensions, parse_label_line, read_manifest, YoloLayout, IMAGE_EXTENSIONS,
    LABEL_EXTENSION,
};
use crate::ir::Split;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// Validates the dataset rooted at `root`.
///
/// Problems with the data are reported as issues; an `Err` means the
/// directory tree could not be traversed at all.
pub fn validate_dataset(
    root: &Path,
    _opts: &ValidateOptions,
) -> Result<ValidationReport, FacelabelError> {
    let layout = YoloLayout::new(root);
    let mut report = ValidationReport::new();

    let class_count = validate_manifest(&layout, &mut report);

    for split in Split::ALL {
        validate_split(&layout, split, class_count, &mut report)?;
    }

    Ok(report)
}

/// Checks `data.yaml` and returns the class count to check labels against.
///
/// A broken manifest yields an error and a class count of 1.
fn validate_manifest(layout: &YoloLayout, report: &mut ValidationReport) -> usize {
    let path = layout.manifest_path();
    let context = || IssueContext::Manifest { path: path.clone() };

    if !path.is_file() {
        report.add(ValidationIssue::error(
            IssueCode::ManifestMissing,
            "data.yaml not found",
            context(),
        ));
        return 1;
    }

    let manifest = match read_manifest(&path) {
        Ok(manifest) => manifest,
        Err(err) => {
            report.add(ValidationIssue::error(
                IssueCode::ManifestInvalid,
                err.to_string(),
                context(),
            ));
            return 1;
        }
    };

    if manifest.nc != manifest.names.len() {
        report.add(ValidationIssue::error(
            IssueCode::ClassCountMismatch,
            format!(
                "nc is {} but {} class name(s) are listed",
                manifest.nc,
                manifest.names.len()
            ),
            context(),
        ));
    }

    for (split, listed) in [(Split::Train, &manifest.train), (Split::Val, &manifest.val)] {
        let expected_suffix = format!("images/{}", split.name());
        if !listed.trim_end_matches('/').ends_with(&expected_suffix) {
            report.add(ValidationIssue::warning(
                IssueCode::ManifestPathMismatch,
                format!("{split} path '{listed}' does not end with '{expected_suffix}'"),
                context(),
            ));
        }
    }

    manifest.nc.max(manifest.names.len())
}

fn validate_split(
    layout: &YoloLayout,
    split: Split,
    class_count: usize,
    report: &mut ValidationReport,
) -> Result<(), FacelabelError> {
    let images_dir = layout.images_dir(split);
    let labels_dir = layout.labels_dir(split);

    let mut dirs_ok = true;
    for dir in [&images_dir, &labels_dir] {
        if !dir.is_dir() {
            report.add(ValidationIssue::error(
                IssueCode::SplitDirMissing,
                format!("missing directory {}", dir.display()),
                IssueContext::Split { split },
            ));
            dirs_ok = false;
        }
    }
    if !dirs_ok {
        return Ok(());
    }

    let (images, shadowed) =
        files_by_stem(collect_files_with_extensions(&images_dir, &IMAGE_EXTENSIONS)?);
    let (labels, _) =
        files_by_stem(collect_files_with_extensions(&labels_dir, &[LABEL_EXTENSION])?);

    report.images += shadowed.len();
    for path in shadowed {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateImageStem,
            "another image has the same stem and owns its label file",
            IssueContext::File { path },
        ));
    }

    if images.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptySplit,
            "split contains no images",
            IssueContext::Split { split },
        ));
    }

    for (stem, image_path) in &images {
        if !labels.contains_key(stem) {
            report.add(ValidationIssue::error(
                IssueCode::MissingLabel,
                format!("no label file named {stem}.{LABEL_EXTENSION}"),
                IssueContext::File {
                    path: image_path.clone(),
                },
            ));
        }
    }

    for (stem, label_path) in &labels {
        if !images.contains_key(stem) {
            report.add(ValidationIssue::error(
                IssueCode::OrphanLabel,
                format!("no image with stem '{stem}'"),
                IssueContext::File {
                    path: label_path.clone(),
                },
            ));
        }
        validate_label_file(label_path, class_count, report)?;
    }

    report.images += images.len();
    report.labels += labels.len();
    Ok(())
}

fn validate_label_file(
    path: &Path,
    class_count: usize,
    report: &mut ValidationReport,
) -> Result<(), FacelabelError> {
    let content = fs::read_to_string(path).map_err(FacelabelError::Io)?;

    for (line_idx, line) in content.lines().enumerate() {
        let context = || IssueContext::Line {
            path: path.to_path_buf(),
            line: line_idx + 1,
        };

        let row = match parse_label_line(line) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(message) => {
                report.add(ValidationIssue::error(IssueCode::LabelParse, message, context()));
                continue;
            }
        };
        report.boxes += 1;

        if row.class_id >= class_count {
            report.add(ValidationIssue::error(
                IssueCode::ClassOutOfRange,
                format!(
                    "class_id {} is out of range for {} class(es)",
                    row.class_id, class_count
                ),
                context(),
            ));
        }

        let in_unit = [row.cx, row.cy, row.w, row.h]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v));
        if !in_unit {
            report.add(ValidationIssue::error(
                IssueCode::CoordinateOutOfRange,
                format!(
                    "box ({}, {}, {}, {}) leaves [0, 1]",
                    row.cx, row.cy, row.w, row.h
                ),
                context(),
            ));
        }
    }

    Ok(())
}

/// Indexes files by stem. Later files whose stem is taken are returned
/// separately.
fn files_by_stem(files: Vec<PathBuf>) -> (BTreeMap<String, PathBuf>, Vec<PathBuf>) {
    let mut by_stem = BTreeMap::new();
    let mut shadowed = Vec::new();

    for path in files {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match by_stem.entry(stem) {
            Entry::Vacant(slot) => {
                slot.insert(path);
            }
            Entry::Occupied(_) => shadowed.push(path),
        }
    }

    (by_stem, shadowed)
}
