//! Data model shared by the WIDER FACE reader and the YOLO writer.
//!
//! [`ImageRecord`] and [`RawBox`] live only for one pass over an annotation
//! file; [`NormalizedBox`] is what ends up in the label files.

use std::fmt;

use serde::Serialize;

use super::bbox::{BBoxCXCYWH, BBoxXYWH};
use super::space::{Normalized, Pixel};

/// Class index written for every face box.
pub const FACE_CLASS_ID: u32 = 0;

/// Class name bound to [`FACE_CLASS_ID`] in the manifest.
pub const FACE_CLASS_NAME: &str = "face";

/// One of the two dataset partitions the corpus ships annotations for.
///
/// The WIDER FACE test split carries no boxes and is not converted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    /// Both splits, in processing order.
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    /// Directory name used under `images/` and `labels/`.
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The six per-face attribute columns that follow the geometry.
///
/// Each is `None` when the column is missing or not a number. Values are
/// kept as written, so `1` and `1.0` compare equal. Only `invalid`
/// affects conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceAttributes {
    pub blur: Option<f64>,
    pub expression: Option<f64>,
    pub illumination: Option<f64>,
    pub invalid: Option<f64>,
    pub occlusion: Option<f64>,
    pub pose: Option<f64>,
}

/// One face row as written in the annotation file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBox {
    pub bbox: BBoxXYWH<Pixel>,
    pub attributes: FaceAttributes,
}

/// Why a raw box did not make it into a label file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxRejection {
    /// The row is flagged as not being a valid face.
    Invalid,
    /// The normalized box leaves `[0, 1]` on some axis, or is not finite.
    OutOfRange,
}

impl RawBox {
    pub fn new(bbox: BBoxXYWH<Pixel>, attributes: FaceAttributes) -> Self {
        Self { bbox, attributes }
    }

    /// True when the `invalid` column is present and non-zero.
    pub fn is_invalid(&self) -> bool {
        self.attributes.invalid.is_some_and(|flag| flag != 0.0)
    }

    /// Normalizes the box against the image size and applies the filters.
    ///
    /// Boxes are never clamped: a box that does not fit the image points
    /// at an annotation/image mismatch and is dropped instead.
    pub fn normalize(
        &self,
        image_width: u32,
        image_height: u32,
    ) -> Result<NormalizedBox, BoxRejection> {
        if self.is_invalid() {
            return Err(BoxRejection::Invalid);
        }
        if !self.bbox.is_finite() {
            return Err(BoxRejection::OutOfRange);
        }

        let bbox = self
            .bbox
            .to_normalized_center(image_width as f64, image_height as f64);
        if !bbox.is_within_unit() {
            return Err(BoxRejection::OutOfRange);
        }

        Ok(NormalizedBox {
            class_id: FACE_CLASS_ID,
            bbox,
        })
    }
}

/// One image entry of an annotation file.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    /// Path relative to the split's image root, as written in the file.
    pub image_relative_path: String,
    /// The count line. May exceed `boxes.len()` when rows were malformed
    /// or the file ended early.
    pub declared_face_count: usize,
    /// Rows that parsed, in file order.
    pub boxes: Vec<RawBox>,
    /// 1-based line number of the path line among the non-blank lines.
    pub line: usize,
    /// Rows that were consumed but could not be parsed.
    pub malformed_rows: usize,
}

/// A face box ready to be written as a YOLO label row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub class_id: u32,
    pub bbox: BBoxCXCYWH<Normalized>,
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cx, cy, w, h) = self.bbox.to_tuple();
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, cx, cy, w, h
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(x: f64, y: f64, w: f64, h: f64, invalid: Option<f64>) -> RawBox {
        RawBox::new(
            BBoxXYWH::new(x, y, w, h),
            FaceAttributes {
                invalid,
                ..Default::default()
            },
        )
    }

    #[test]
    fn normalize_keeps_valid_box() {
        let norm = raw(10.0, 10.0, 20.0, 20.0, Some(0.0))
            .normalize(100, 100)
            .expect("box should be kept");
        assert_eq!(norm.to_string(), "0 0.200000 0.200000 0.200000 0.200000");
    }

    #[test]
    fn normalize_rejects_invalid_flag_before_geometry() {
        // Geometry is fine, the flag alone drops it.
        let err = raw(10.0, 10.0, 20.0, 20.0, Some(1.0))
            .normalize(100, 100)
            .unwrap_err();
        assert_eq!(err, BoxRejection::Invalid);
    }

    #[test]
    fn missing_invalid_column_means_valid() {
        assert!(!raw(1.0, 1.0, 2.0, 2.0, None).is_invalid());
        assert!(raw(1.0, 1.0, 2.0, 2.0, Some(3.0)).is_invalid());
    }

    #[test]
    fn normalize_rejects_out_of_range_without_clamping() {
        let err = raw(90.0, 10.0, 30.0, 10.0, None)
            .normalize(100, 100)
            .unwrap_err();
        assert_eq!(err, BoxRejection::OutOfRange);
    }

    #[test]
    fn normalize_rejects_non_finite_geometry() {
        for (x, w) in [(f64::NAN, 2.0), (1.0, f64::INFINITY)] {
            let err = raw(x, 1.0, w, 2.0, None).normalize(100, 100).unwrap_err();
            assert_eq!(err, BoxRejection::OutOfRange);
        }
    }

    #[test]
    fn display_uses_six_decimals() {
        let norm = NormalizedBox {
            class_id: FACE_CLASS_ID,
            bbox: BBoxCXCYWH::new(0.5, 1.0 / 3.0, 0.25, 0.0),
        };
        assert_eq!(norm.to_string(), "0 0.500000 0.333333 0.250000 0.000000");
    }

    #[test]
    fn split_names_match_directory_layout() {
        assert_eq!(Split::Train.name(), "train");
        assert_eq!(Split::Val.to_string(), "val");
        assert_eq!(Split::ALL, [Split::Train, Split::Val]);
    }
}
