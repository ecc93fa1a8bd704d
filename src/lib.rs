//! Facelabel: WIDER FACE to YOLO dataset converter.
//!
//! Facelabel reads the WIDER FACE ground-truth files (a path line, a face
//! count, then one row per face), normalizes every face box against its
//! image, and writes an Ultralytics-style YOLO dataset with a `data.yaml`
//! manifest.
//!
//! # Modules
//!
//! - [`ir`]: record and box types, the WIDER reader, the YOLO writer
//! - [`conversion`]: the per-split conversion pipeline and its report
//! - [`validation`]: checks for a converted dataset
//! - [`error`]: error types for facelabel operations

pub mod conversion;
pub mod error;
pub mod ir;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use conversion::{ConvertOptions, SplitSource, DEFAULT_PROGRESS_EVERY};
pub use error::FacelabelError;
use ir::encoding::{resolve_encoding, DEFAULT_FALLBACK_ENCODING};
use ir::io_wider::{ParserOptions, ReadOptions};
use ir::Split;

/// The facelabel CLI application.
#[derive(Parser)]
#[command(name = "facelabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert WIDER FACE annotations into a YOLO dataset.
    Convert(ConvertArgs),
    /// Check a converted YOLO dataset for errors and warnings.
    Validate(ValidateArgs),
}

/// Report rendering for stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Root of the extracted WIDER FACE download (contains wider_face_split/,
    /// WIDER_train/, WIDER_val/).
    #[arg(long, env = "WIDER_ROOT")]
    wider_root: Option<PathBuf>,

    /// Train ground-truth file [default: <wider-root>/wider_face_split/wider_face_train_bbx_gt.txt]
    #[arg(long)]
    train_annotations: Option<PathBuf>,

    /// Train image root [default: <wider-root>/WIDER_train/images]
    #[arg(long)]
    train_images: Option<PathBuf>,

    /// Val ground-truth file [default: <wider-root>/wider_face_split/wider_face_val_bbx_gt.txt]
    #[arg(long)]
    val_annotations: Option<PathBuf>,

    /// Val image root [default: <wider-root>/WIDER_val/images]
    #[arg(long)]
    val_images: Option<PathBuf>,

    /// Output dataset root.
    #[arg(short, long, env = "DATASET_ROOT")]
    output: PathBuf,

    /// Decode annotation files with this encoding instead of detecting it.
    #[arg(long)]
    encoding: Option<String>,

    /// Encoding used when detection is inconclusive or decoding fails.
    #[arg(long, default_value = DEFAULT_FALLBACK_ENCODING)]
    fallback_encoding: String,

    /// Log progress every N converted images (0 disables).
    #[arg(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: usize,

    /// Consume the all-zero row WIDER FACE writes after a count of 0.
    #[arg(long)]
    zero_count_placeholder: bool,

    /// Convert train and val concurrently.
    #[arg(long)]
    parallel_splits: bool,

    /// Exit non-zero if an annotation file ends in the middle of a record.
    #[arg(long)]
    strict_truncation: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    report: OutputFormat,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Dataset root containing data.yaml, images/ and labels/.
    input: PathBuf,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Run the facelabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), FacelabelError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Validate(args)) => run_validate(args),
        None => {
            println!("facelabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("WIDER FACE to YOLO dataset converter.");
            println!();
            println!("Run 'facelabel --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), FacelabelError> {
    let strict_truncation = args.strict_truncation;
    let format = args.report;
    let opts = convert_options(args)?;

    let report = conversion::convert_dataset(&opts)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            print!("{}", report);
            println!("Dataset ready at {}", report.output.display());
        }
    }

    if strict_truncation {
        if let Some(split) = report.truncated_splits().next() {
            return Err(FacelabelError::SplitTruncated {
                split: split.split,
                path: split.annotation_file.clone(),
            });
        }
    }

    Ok(())
}

/// Resolves CLI arguments and environment into conversion options.
fn convert_options(args: ConvertArgs) -> Result<ConvertOptions, FacelabelError> {
    let fallback = resolve_encoding(&args.fallback_encoding)?;
    let root = args.wider_root.as_deref();

    Ok(ConvertOptions {
        output: args.output,
        train: split_source(root, Split::Train, args.train_annotations, args.train_images)?,
        val: split_source(root, Split::Val, args.val_annotations, args.val_images)?,
        read: ReadOptions {
            encoding: args.encoding,
            fallback,
        },
        parser: ParserOptions {
            zero_count_placeholder: args.zero_count_placeholder,
        },
        progress_every: args.progress_every,
        parallel_splits: args.parallel_splits,
    })
}

fn split_source(
    root: Option<&Path>,
    split: Split,
    annotations: Option<PathBuf>,
    images: Option<PathBuf>,
) -> Result<SplitSource, FacelabelError> {
    let defaults = root.map(|root| SplitSource::from_wider_root(root, split));
    let missing = |what: &str| FacelabelError::InvalidOptions {
        message: format!("--{split}-{what} is required when --wider-root (WIDER_ROOT) is not set"),
    };

    let annotations = match annotations {
        Some(path) => path,
        None => defaults
            .as_ref()
            .map(|d| d.annotations.clone())
            .ok_or_else(|| missing("annotations"))?,
    };
    let images = match images {
        Some(path) => path,
        None => defaults
            .as_ref()
            .map(|d| d.images.clone())
            .ok_or_else(|| missing("images"))?,
    };

    Ok(SplitSource {
        split,
        annotations,
        images,
    })
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), FacelabelError> {
    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate_dataset(&args.input, &opts)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (args.strict && has_warnings) {
        Err(FacelabelError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_convert(args: &[&str]) -> ConvertArgs {
        let cli = Cli::try_parse_from(std::iter::once("facelabel").chain(args.iter().copied()))
            .expect("parse args");
        match cli.command {
            Some(Commands::Convert(args)) => args,
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn wider_root_provides_default_sources() {
        let args = parse_convert(&["convert", "--wider-root", "/w", "-o", "/out"]);
        let opts = convert_options(args).expect("options");
        assert_eq!(opts.train, SplitSource::from_wider_root(Path::new("/w"), Split::Train));
        assert_eq!(opts.val.images, PathBuf::from("/w/WIDER_val/images"));
        assert_eq!(opts.progress_every, DEFAULT_PROGRESS_EVERY);
        assert!(!opts.parser.zero_count_placeholder);
    }

    #[test]
    fn explicit_paths_override_root() {
        let args = parse_convert(&[
            "convert",
            "--wider-root",
            "/w",
            "--val-annotations",
            "/elsewhere/val.txt",
            "-o",
            "/out",
        ]);
        let opts = convert_options(args).expect("options");
        assert_eq!(opts.val.annotations, PathBuf::from("/elsewhere/val.txt"));
        assert_eq!(opts.val.images, PathBuf::from("/w/WIDER_val/images"));
    }

    #[test]
    fn sources_are_required_without_root() {
        let args = parse_convert(&[
            "convert",
            "--train-annotations",
            "t.txt",
            "--train-images",
            "t",
            "-o",
            "/out",
        ]);
        let err = convert_options(args).err().expect("should fail");
        assert!(err.to_string().contains("--val-annotations"));
    }

    #[test]
    fn unknown_fallback_encoding_is_rejected() {
        let args = parse_convert(&[
            "convert",
            "--wider-root",
            "/w",
            "-o",
            "/out",
            "--fallback-encoding",
            "nope",
        ]);
        assert!(matches!(
            convert_options(args),
            Err(FacelabelError::UnknownEncoding { .. })
        ));
    }
}
