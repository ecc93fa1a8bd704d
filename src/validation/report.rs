//! Validation report types for structured error reporting.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::ir::Split;

/// The result of checking a converted dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// Images checked, across splits.
    pub images: usize,
    /// Label files checked, across splits.
    pub labels: usize,
    /// Label rows checked, across splits.
    pub boxes: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(
                f,
                "Validation passed: {} image(s), {} label file(s), {} box(es), no issues found",
                self.images, self.labels, self.boxes
            );
        }

        writeln!(
            f,
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Unusual but usable.
    Warning,
    /// Breaks the dataset for training tools.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // Manifest
    /// `data.yaml` does not exist.
    ManifestMissing,
    /// `data.yaml` is not valid YAML or lacks required keys.
    ManifestInvalid,
    /// `nc` disagrees with the length of `names`.
    ClassCountMismatch,
    /// A split path in the manifest does not point at `images/<split>`.
    ManifestPathMismatch,

    // Layout
    /// `images/<split>` or `labels/<split>` is missing.
    SplitDirMissing,
    /// A split has no images.
    EmptySplit,
    /// A label file has no image with the same stem.
    OrphanLabel,
    /// An image has no label file with the same stem.
    MissingLabel,
    /// Two images share a stem, so they would share one label file.
    DuplicateImageStem,

    // Label rows
    /// A label row cannot be parsed.
    LabelParse,
    /// A label row uses a class index not listed in the manifest.
    ClassOutOfRange,
    /// A label row has a value outside `[0, 1]` or not finite.
    CoordinateOutOfRange,
}

/// Where a validation issue occurred.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueContext {
    Manifest { path: PathBuf },
    Split { split: Split },
    File { path: PathBuf },
    Line { path: PathBuf, line: usize },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Manifest { path } => write!(f, "manifest {}", path.display()),
            IssueContext::Split { split } => write!(f, "split {}", split),
            IssueContext::File { path } => write!(f, "{}", path.display()),
            IssueContext::Line { path, line } => write!(f, "{}:{}", path.display(), line),
        }
    }
}
