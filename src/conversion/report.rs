//! Conversion report types.
//!
//! A [`SplitReport`] is the accumulator threaded through one split's
//! conversion; the [`ConversionReport`] collects both splits once the
//! manifest has been written.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::ir::Split;

/// The outcome of converting both splits.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionReport {
    /// Dataset root that was written.
    pub output: PathBuf,
    /// Path of the generated `data.yaml`.
    pub manifest: PathBuf,
    /// One entry per split, in train, val order.
    pub splits: Vec<SplitReport>,
}

impl ConversionReport {
    /// Total images converted across splits.
    pub fn converted(&self) -> usize {
        self.splits.iter().map(|s| s.converted).sum()
    }

    /// Total records skipped across splits.
    pub fn failed(&self) -> usize {
        self.splits.iter().map(|s| s.failed).sum()
    }

    /// Splits whose annotation file ended mid-record.
    pub fn truncated_splits(&self) -> impl Iterator<Item = &SplitReport> {
        self.splits.iter().filter(|s| s.truncated)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for split in &self.splits {
            write!(f, "{}", split)?;
            writeln!(f)?;
        }
        writeln!(
            f,
            "Converted {} image(s), {} failed. Manifest: {}",
            self.converted(),
            self.failed(),
            self.manifest.display()
        )
    }
}

/// Running tallies for one split.
#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    pub split: Split,
    pub annotation_file: PathBuf,
    /// Encoding that decoded the annotation file.
    pub encoding: String,
    pub used_fallback_encoding: bool,
    /// Non-blank annotation lines read.
    pub lines: usize,
    /// Records whose image and label were written.
    pub converted: usize,
    /// Records skipped (bad count, missing or unreadable image).
    pub failed: usize,
    pub boxes_written: usize,
    pub boxes_invalid: usize,
    pub boxes_out_of_range: usize,
    pub malformed_box_rows: usize,
    /// The file ended in the middle of a record.
    pub truncated: bool,
    pub issues: Vec<ConversionIssue>,
}

impl SplitReport {
    pub fn new(split: Split, annotation_file: impl Into<PathBuf>) -> Self {
        Self {
            split,
            annotation_file: annotation_file.into(),
            encoding: String::new(),
            used_fallback_encoding: false,
            lines: 0,
            converted: 0,
            failed: 0,
            boxes_written: 0,
            boxes_invalid: 0,
            boxes_out_of_range: 0,
            malformed_box_rows: 0,
            truncated: false,
            issues: Vec::new(),
        }
    }

    /// Records a skipped record.
    pub fn fail(&mut self, issue: ConversionIssue) {
        self.failed += 1;
        self.issues.push(issue);
    }

    /// Adds a note that does not change the tallies.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    pub fn issues_with_code(&self, code: ConversionIssueCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} converted, {} failed ({} lines, encoding {}{})",
            self.split,
            self.converted,
            self.failed,
            self.lines,
            self.encoding,
            if self.used_fallback_encoding {
                ", fallback"
            } else {
                ""
            }
        )?;
        writeln!(
            f,
            "  boxes: {} written, {} invalid, {} out of range, {} malformed row(s)",
            self.boxes_written, self.boxes_invalid, self.boxes_out_of_range, self.malformed_box_rows
        )?;
        if self.truncated {
            writeln!(f, "  annotation file ended in the middle of a record")?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f, "  Warnings ({}):", warnings)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Warning)
            {
                writeln!(f, "    - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// A single anomaly met while converting a split.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
    /// 1-based line in the annotation file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl ConversionIssue {
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
            line: None,
        }
    }

    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Something was skipped or cut short.
    Warning,
    /// A recovered condition worth knowing about.
    Info,
}

/// Stable issue codes for programmatic consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// The count line was not a non-negative integer.
    MalformedCount,
    /// The referenced image does not exist.
    ImageMissing,
    /// The image header could not be read.
    ImageUnreadable,
    /// The image reports zero width or height.
    ImageZeroDimension,
    /// The annotation file ended inside a record.
    Truncated,
    /// The annotation file was decoded with the fallback encoding.
    EncodingFallback,
    /// Undecodable bytes were dropped from the annotation file.
    DroppedBytes,
    /// Two records share an image file name; the later one wins.
    DuplicateFileName,
    /// The image extension is not one training tools read.
    UnsupportedImageType,
    /// Another image with the same stem already owns the label file.
    StemCollision,
    /// Could not carry over the source image's timestamps.
    TimestampsNotPreserved,
}
