use std::path::PathBuf;
use thiserror::Error;

use crate::ir::Split;
use crate::validation::ValidationReport;

/// The main error type for facelabel operations.
#[derive(Debug, Error)]
pub enum FacelabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown text encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("Failed to read annotation file {path}: {source}")]
    AnnotationRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path} as '{primary}' ({message}) or as '{fallback}': {source}")]
    AnnotationDecode {
        path: PathBuf,
        primary: String,
        fallback: String,
        message: String,
        #[source]
        source: Box<FacelabelError>,
    },

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy image {from} to {to}: {source}")]
    ImageCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write label file {path}: {source}")]
    LabelWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Invalid YOLO dataset layout at {path}: {message}")]
    LayoutInvalid { path: PathBuf, message: String },

    #[error("Annotation file for split '{split}' ended in the middle of a record: {path}")]
    SplitTruncated { split: Split, path: PathBuf },

    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("Failed to serialize report: {0}")]
    ReportJson(#[from] serde_json::Error),

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}
