//! WIDER FACE to YOLO conversion.
//!
//! Each split is converted start to finish on its own: decode the
//! annotation file, walk its records in file order, and for every record
//! whose image can be found and measured, copy the image and write its
//! label file. Per-record problems are tallied in the split's
//! [`SplitReport`] and never abort the split; only an annotation file that
//! cannot be decoded at all does.

pub mod report;

pub use report::{
    ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity, SplitReport,
};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{info, warn};

use crate::error::FacelabelError;
use crate::ir::io_wider::{
    read_annotation_lines, ParseEvent, ParserOptions, ReadOptions, RecordParser,
};
use crate::ir::io_yolo::{
    is_image_file, read_image_dimensions, render_labels, write_label_file, write_manifest,
    YoloLayout, IMAGE_EXTENSIONS,
};
use crate::ir::{ImageRecord, Split};

/// Default interval, in converted images, between progress log lines.
pub const DEFAULT_PROGRESS_EVERY: usize = 1000;

/// Where one split's annotations and images live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitSource {
    pub split: Split,
    pub annotations: PathBuf,
    pub images: PathBuf,
}

impl SplitSource {
    /// The standard locations inside an extracted WIDER FACE download.
    pub fn from_wider_root(root: &Path, split: Split) -> Self {
        Self {
            split,
            annotations: root
                .join("wider_face_split")
                .join(format!("wider_face_{}_bbx_gt.txt", split.name())),
            images: root.join(format!("WIDER_{}", split.name())).join("images"),
        }
    }
}

/// Everything a conversion run needs.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Dataset root to create or refresh.
    pub output: PathBuf,
    pub train: SplitSource,
    pub val: SplitSource,
    pub read: ReadOptions,
    pub parser: ParserOptions,
    /// Log running counts every this many converted images; `0` disables.
    pub progress_every: usize,
    /// Convert train and val on separate threads.
    pub parallel_splits: bool,
}

/// Converts both splits and writes the manifest.
///
/// Fails only when an annotation file cannot be decoded or the output tree
/// cannot be written; everything else ends up in the report.
pub fn convert_dataset(opts: &ConvertOptions) -> Result<ConversionReport, FacelabelError> {
    let layout = YoloLayout::new(&opts.output);
    layout.create_dirs()?;

    let sources = [&opts.train, &opts.val];
    let splits = if opts.parallel_splits {
        let layout = &layout;
        std::thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|source| scope.spawn(move || convert_split(layout, source, opts)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Result<Vec<_>, _>>()
        })?
    } else {
        sources
            .iter()
            .map(|source| convert_split(&layout, source, opts))
            .collect::<Result<Vec<_>, _>>()?
    };

    let manifest = write_manifest(&layout)?;
    let report = ConversionReport {
        output: opts.output.clone(),
        manifest,
        splits,
    };

    info!(
        converted = report.converted(),
        failed = report.failed(),
        output = %opts.output.display(),
        "conversion finished"
    );

    Ok(report)
}

/// Converts one split into `layout`.
///
/// Records are handled strictly in file order.
pub fn convert_split(
    layout: &YoloLayout,
    source: &SplitSource,
    opts: &ConvertOptions,
) -> Result<SplitReport, FacelabelError> {
    let split = source.split;
    info!(
        %split,
        annotations = %source.annotations.display(),
        images = %source.images.display(),
        "converting split"
    );

    layout.create_split_dirs(split)?;
    let annotation = read_annotation_lines(&source.annotations, &opts.read)?;

    let mut report = SplitReport::new(split, &source.annotations);
    report.encoding = annotation.encoding.clone();
    report.used_fallback_encoding = annotation.used_fallback;
    report.lines = annotation.lines.len();

    if annotation.used_fallback {
        report.add(ConversionIssue::info(
            ConversionIssueCode::EncodingFallback,
            format!("annotation file decoded with fallback encoding {}", annotation.encoding),
        ));
    }
    if annotation.dropped_bytes > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::DroppedBytes,
            format!(
                "{} undecodable byte(s) dropped from annotation file",
                annotation.dropped_bytes
            ),
        ));
    }

    let mut materializer = Materializer {
        layout,
        source,
        progress_every: opts.progress_every,
        claimed_labels: HashMap::new(),
    };

    for event in RecordParser::new(annotation.lines.iter(), opts.parser) {
        match event {
            ParseEvent::Record(record) => materializer.materialize(&record, &mut report)?,
            ParseEvent::MalformedCount {
                image_relative_path,
                line,
                raw,
            } => {
                warn!(
                    %split,
                    line,
                    image = %image_relative_path,
                    count = %raw,
                    "face count is not a number, skipping record"
                );
                report.fail(
                    ConversionIssue::warning(
                        ConversionIssueCode::MalformedCount,
                        format!(
                            "face count '{raw}' for {image_relative_path} \
                             is not a non-negative integer"
                        ),
                    )
                    .at_line(line),
                );
            }
            ParseEvent::Truncated {
                image_relative_path,
                line,
                declared,
                found,
            } => {
                warn!(
                    %split,
                    line,
                    image = %image_relative_path,
                    ?declared,
                    found,
                    "annotation file ended mid-record"
                );
                report.truncated = true;
                match declared {
                    Some(declared) => report.add(
                        ConversionIssue::warning(
                            ConversionIssueCode::Truncated,
                            format!(
                                "{image_relative_path} declares {declared} face(s) \
                                 but the file ends after {found}"
                            ),
                        )
                        .at_line(line),
                    ),
                    None => report.fail(
                        ConversionIssue::warning(
                            ConversionIssueCode::Truncated,
                            format!("file ends before the face count of {image_relative_path}"),
                        )
                        .at_line(line),
                    ),
                }
            }
        }
    }

    info!(
        %split,
        converted = report.converted,
        failed = report.failed,
        truncated = report.truncated,
        "finished split"
    );

    Ok(report)
}

/// Writes images and labels for the records of one split.
struct Materializer<'a> {
    layout: &'a YoloLayout,
    source: &'a SplitSource,
    progress_every: usize,
    /// Label path to the image file name that owns it.
    claimed_labels: HashMap<PathBuf, PathBuf>,
}

impl Materializer<'_> {
    fn materialize(
        &mut self,
        record: &ImageRecord,
        report: &mut SplitReport,
    ) -> Result<(), FacelabelError> {
        let split = self.source.split;
        let image_path = self.source.images.join(&record.image_relative_path);

        let file_name = match image_path.file_name() {
            Some(name) if image_path.is_file() => PathBuf::from(name),
            _ => {
                warn!(%split, path = %image_path.display(), "image not found, skipping record");
                report.fail(
                    ConversionIssue::warning(
                        ConversionIssueCode::ImageMissing,
                        format!("image not found: {}", image_path.display()),
                    )
                    .at_line(record.line),
                );
                return Ok(());
            }
        };

        if !is_image_file(&file_name) {
            warn!(
                %split,
                path = %image_path.display(),
                "not a supported image type, skipping record"
            );
            report.fail(
                ConversionIssue::warning(
                    ConversionIssueCode::UnsupportedImageType,
                    format!(
                        "{} is not one of: {}",
                        image_path.display(),
                        IMAGE_EXTENSIONS.join(", ")
                    ),
                )
                .at_line(record.line),
            );
            return Ok(());
        }

        let (width, height) = match read_image_dimensions(&image_path) {
            Ok(dims) => dims,
            Err(err) => {
                warn!(
                    %split,
                    path = %image_path.display(),
                    error = %err,
                    "cannot read image size, skipping record"
                );
                report.fail(
                    ConversionIssue::warning(ConversionIssueCode::ImageUnreadable, err.to_string())
                        .at_line(record.line),
                );
                return Ok(());
            }
        };

        if width == 0 || height == 0 {
            warn!(
                %split,
                path = %image_path.display(),
                width,
                height,
                "image has a zero dimension, skipping record"
            );
            report.fail(
                ConversionIssue::warning(
                    ConversionIssueCode::ImageZeroDimension,
                    format!("image {} is {}x{}", image_path.display(), width, height),
                )
                .at_line(record.line),
            );
            return Ok(());
        }

        // Labels are keyed by stem, so `a.jpg` and `a.png` would share one.
        let label_path = self.layout.label_path(split, &file_name);
        match self.claimed_labels.get(&label_path) {
            Some(owner) if *owner != file_name => {
                warn!(
                    %split,
                    image = %record.image_relative_path,
                    owner = %owner.display(),
                    "image stem already used by another image, skipping record"
                );
                report.fail(
                    ConversionIssue::warning(
                        ConversionIssueCode::StemCollision,
                        format!(
                            "{} has the same stem as {}, whose label is already written",
                            record.image_relative_path,
                            owner.display()
                        ),
                    )
                    .at_line(record.line),
                );
                return Ok(());
            }
            Some(_) => report.add(
                ConversionIssue::warning(
                    ConversionIssueCode::DuplicateFileName,
                    format!(
                        "{} reuses an image file name already written for this split",
                        record.image_relative_path
                    ),
                )
                .at_line(record.line),
            ),
            None => {
                self.claimed_labels.insert(label_path.clone(), file_name.clone());
            }
        }

        let image_target = self.layout.images_dir(split).join(&file_name);
        copy_image(&image_path, &image_target, report)?;

        let rendered = render_labels(record, width, height);
        write_label_file(&label_path, &rendered.text)?;

        report.converted += 1;
        report.boxes_written += rendered.kept;
        report.boxes_invalid += rendered.invalid;
        report.boxes_out_of_range += rendered.out_of_range;
        report.malformed_box_rows += record.malformed_rows;

        if self.progress_every > 0 && report.converted % self.progress_every == 0 {
            info!(%split, converted = report.converted, failed = report.failed, "progress");
        }

        Ok(())
    }
}

/// Copies an image byte for byte and carries over its timestamps.
fn copy_image(from: &Path, to: &Path, report: &mut SplitReport) -> Result<(), FacelabelError> {
    fs::copy(from, to).map_err(|source| FacelabelError::ImageCopy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;

    if let Err(err) = preserve_timestamps(from, to) {
        warn!(path = %to.display(), error = %err, "could not preserve image timestamps");
        report.add(ConversionIssue::info(
            ConversionIssueCode::TimestampsNotPreserved,
            format!("timestamps of {} not preserved: {err}", to.display()),
        ));
    }

    Ok(())
}

fn preserve_timestamps(from: &Path, to: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(from)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(to, atime, mtime)
}
