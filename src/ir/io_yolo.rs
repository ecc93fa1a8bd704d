//! Ultralytics-style YOLO output.
//!
//! Layout under the dataset root:
//!
//! ```text
//! images/{train,val}/<name>.<ext>
//! labels/{train,val}/<stem>.txt
//! data.yaml
//! ```
//!
//! Label rows are `class cx cy w h`, normalized, 6 decimal places.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::model::{BoxRejection, ImageRecord, Split, FACE_CLASS_NAME};
use crate::error::FacelabelError;

/// Image types accepted on conversion and recognised on validation.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "png", "jpeg", "bmp", "webp", "tif", "tiff"];
pub const LABEL_EXTENSION: &str = "txt";
pub const MANIFEST_FILE_NAME: &str = "data.yaml";

/// Paths of a YOLO dataset rooted at one directory.
#[derive(Clone, Debug)]
pub struct YoloLayout {
    root: PathBuf,
}

impl YoloLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.root.join("images").join(split.name())
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    /// Label path for an image file name: same stem, `.txt` extension.
    pub fn label_path(&self, split: Split, image_file_name: &Path) -> PathBuf {
        self.labels_dir(split)
            .join(image_file_name.with_extension(LABEL_EXTENSION))
    }

    /// Creates the image and label directories of one split.
    pub fn create_split_dirs(&self, split: Split) -> Result<(), FacelabelError> {
        for dir in [self.images_dir(split), self.labels_dir(split)] {
            fs::create_dir_all(&dir)
                .map_err(|source| FacelabelError::CreateDir { path: dir, source })?;
        }
        Ok(())
    }

    /// Creates all four split directories. Safe to call on an existing tree.
    pub fn create_dirs(&self) -> Result<(), FacelabelError> {
        for split in Split::ALL {
            self.create_split_dirs(split)?;
        }
        info!(root = %self.root.display(), "prepared YOLO directory layout");
        Ok(())
    }
}

/// Label file contents for one record, plus what was filtered out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedLabels {
    pub text: String,
    pub kept: usize,
    pub invalid: usize,
    pub out_of_range: usize,
}

/// Normalizes and filters a record's boxes into label text.
///
/// Rows keep their annotation order. Every row ends with `\n`; a record
/// with no surviving boxes renders to an empty string.
pub fn render_labels(record: &ImageRecord, image_width: u32, image_height: u32) -> RenderedLabels {
    let mut rendered = RenderedLabels::default();

    for raw in &record.boxes {
        match raw.normalize(image_width, image_height) {
            Ok(normalized) => {
                rendered.text.push_str(&normalized.to_string());
                rendered.text.push('\n');
                rendered.kept += 1;
            }
            Err(BoxRejection::Invalid) => rendered.invalid += 1,
            Err(BoxRejection::OutOfRange) => {
                debug!(
                    image = %record.image_relative_path,
                    bbox = ?raw.bbox,
                    image_width,
                    image_height,
                    "dropped box outside image bounds"
                );
                rendered.out_of_range += 1;
            }
        }
    }

    rendered
}

/// Writes a label file, replacing any previous contents.
pub fn write_label_file(path: &Path, text: &str) -> Result<(), FacelabelError> {
    fs::write(path, text).map_err(|source| FacelabelError::LabelWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads width and height from an image header.
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32), FacelabelError> {
    let size = imagesize::size(path).map_err(|source| FacelabelError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| FacelabelError::LayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image width {} does not fit in u32", size.width),
        })?;

    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| FacelabelError::LayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image height {} does not fit in u32", size.height),
        })?;

    Ok((width, height))
}

/// The `data.yaml` descriptor consumed by training tools.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Manifest {
    pub train: String,
    pub val: String,
    pub nc: usize,
    pub names: Vec<String>,
}

/// Renders the manifest for a dataset root.
///
/// Paths always use `/`, whatever the host separator is.
pub fn render_manifest(layout: &YoloLayout) -> String {
    let names: Vec<String> = [FACE_CLASS_NAME]
        .iter()
        .map(|name| yaml_single_quoted(name))
        .collect();

    format!(
        "train: {}\nval: {}\nnc: {}\nnames: [{}]\n",
        portable_path(&manifest_dir(layout, Split::Train)),
        portable_path(&manifest_dir(layout, Split::Val)),
        names.len(),
        names.join(", ")
    )
}

/// Writes `data.yaml` at the dataset root and returns its path.
pub fn write_manifest(layout: &YoloLayout) -> Result<PathBuf, FacelabelError> {
    let path = layout.manifest_path();
    fs::write(&path, render_manifest(layout)).map_err(|source| {
        FacelabelError::ManifestWrite {
            path: path.clone(),
            source,
        }
    })?;
    info!(path = %path.display(), "wrote dataset manifest");
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<Manifest, FacelabelError> {
    let data = fs::read_to_string(path).map_err(FacelabelError::Io)?;
    serde_yaml::from_str(&data).map_err(|source| FacelabelError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

fn manifest_dir(layout: &YoloLayout, split: Split) -> PathBuf {
    let dir = layout.images_dir(split);
    std::path::absolute(&dir).unwrap_or(dir)
}

fn portable_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// A parsed label row.
#[derive(Debug, PartialEq)]
pub struct YoloLabelRow {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Parses one label row. Blank lines yield `Ok(None)`; the error is a
/// human-readable reason.
pub fn parse_label_line(line: &str) -> Result<Option<YoloLabelRow>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        return Err(format!("expected 5 tokens, found {}", tokens.len()));
    }

    let class_id = tokens[0].parse::<usize>().map_err(|_| {
        format!(
            "invalid class_id '{}'; expected non-negative integer",
            tokens[0]
        )
    })?;

    let cx = parse_f64_token(tokens[1], "x_center")?;
    let cy = parse_f64_token(tokens[2], "y_center")?;
    let w = parse_f64_token(tokens[3], "width")?;
    let h = parse_f64_token(tokens[4], "height")?;

    Ok(Some(YoloLabelRow {
        class_id,
        cx,
        cy,
        w,
        h,
    }))
}

fn parse_f64_token(raw: &str, field_name: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {field_name} '{raw}'; expected floating-point number"))
}

/// Lists regular files directly inside `dir` whose extension is in
/// `extensions` (case-insensitive), sorted by path.
pub fn collect_files_with_extensions(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, FacelabelError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|source| FacelabelError::LayoutInvalid {
            path: dir.to_path_buf(),
            message: format!("failed while traversing directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// True if `path` has one of [`IMAGE_EXTENSIONS`], in any case.
pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::io_wider::parse_box_row;

    fn record(rows: &[&str]) -> ImageRecord {
        ImageRecord {
            image_relative_path: "0--Parade/a.jpg".to_string(),
            declared_face_count: rows.len(),
            boxes: rows.iter().filter_map(|row| parse_box_row(row)).collect(),
            line: 1,
            malformed_rows: 0,
        }
    }

    #[test]
    fn render_labels_keeps_order_and_counts_rejections() {
        let rendered = render_labels(
            &record(&[
                "10 10 20 20 0 0 0 0 0 0",
                "5 5 9999 9999 0 0 0 1 0 0",
                "90 90 30 30 0 0 0 0 0 0",
                "0 0 50 100 0 0 0 0 0 0",
            ]),
            100,
            100,
        );

        assert_eq!(
            rendered.text,
            "0 0.200000 0.200000 0.200000 0.200000\n0 0.250000 0.500000 0.500000 1.000000\n"
        );
        assert_eq!(rendered.kept, 2);
        assert_eq!(rendered.invalid, 1);
        assert_eq!(rendered.out_of_range, 1);
    }

    #[test]
    fn render_labels_of_all_rejected_is_empty() {
        let rendered = render_labels(&record(&["1 1 2 2 0 0 0 1 0 0"]), 10, 10);
        assert!(rendered.text.is_empty());
        assert_eq!(rendered.kept, 0);
    }

    #[test]
    fn label_path_replaces_extension() {
        let layout = YoloLayout::new("/data/out");
        assert_eq!(
            layout.label_path(Split::Val, Path::new("12_Group_Group_12_Group_Group_12_10.jpg")),
            PathBuf::from("/data/out/labels/val/12_Group_Group_12_Group_Group_12_10.txt")
        );
    }

    #[test]
    fn create_dirs_is_idempotent() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = YoloLayout::new(temp.path());
        layout.create_dirs().expect("first create");
        layout.create_dirs().expect("second create");

        for split in Split::ALL {
            assert!(layout.images_dir(split).is_dir());
            assert!(layout.labels_dir(split).is_dir());
        }
    }

    #[test]
    fn manifest_matches_expected_format() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = YoloLayout::new(temp.path());
        let root = portable_path(temp.path());

        assert_eq!(
            render_manifest(&layout),
            format!(
                "train: {root}/images/train\nval: {root}/images/val\nnc: 1\nnames: ['face']\n"
            )
        );
    }

    #[test]
    fn manifest_round_trips_through_yaml() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = YoloLayout::new(temp.path());
        let path = write_manifest(&layout).expect("write manifest");

        let manifest = read_manifest(&path).expect("read manifest");
        assert_eq!(manifest.nc, 1);
        assert_eq!(manifest.names, vec!["face"]);
        assert!(manifest.train.ends_with("/images/train"));
        assert!(!manifest.val.contains('\\'));
    }

    #[test]
    fn portable_path_uses_forward_slashes() {
        assert_eq!(portable_path(Path::new(r"D:\data\out")), "D:/data/out");
    }

    #[test]
    fn parse_label_line_accepts_valid_rows() {
        let parsed = parse_label_line("0 0.5 0.25 0.3 0.1")
            .expect("parse should succeed")
            .expect("line should produce a row");

        assert_eq!(
            parsed,
            YoloLabelRow {
                class_id: 0,
                cx: 0.5,
                cy: 0.25,
                w: 0.3,
                h: 0.1,
            }
        );
    }

    #[test]
    fn parse_label_line_rejects_wrong_token_counts() {
        assert!(parse_label_line("0 0.1 0.2").is_err());
        assert!(parse_label_line("0 0.1 0.2 0.3 0.4 0.5").is_err());
        assert_eq!(parse_label_line("   "), Ok(None));
    }

    #[test]
    fn collect_files_filters_by_extension() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("b.JPG"), b"x").expect("write");
        fs::write(temp.path().join("a.png"), b"x").expect("write");
        fs::write(temp.path().join("notes.md"), b"x").expect("write");

        let files =
            collect_files_with_extensions(temp.path(), &IMAGE_EXTENSIONS).expect("collect");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
    }

    #[test]
    fn image_files_are_recognised_by_extension() {
        assert!(is_image_file(Path::new("0--Parade/a.JPEG")));
        assert!(is_image_file(Path::new("scan.tiff")));
        assert!(!is_image_file(Path::new("anim.gif")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
