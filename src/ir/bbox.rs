//! Bounding box types for the two layouts the converter deals with.
//!
//! [`BBoxXYWH`] is the WIDER FACE layout (top-left corner plus size).
//! [`BBoxCXCYWH`] is the YOLO layout (center plus size).

use std::marker::PhantomData;

use super::{Normalized, Pixel};

/// An axis-aligned box anchored at its top-left corner.
///
/// Construction does not check the values: negative sizes or NaN are
/// representable so the filter can reject them with a reason instead of
/// the parser panicking.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYWH<TSpace> {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYWH<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            _space: PhantomData,
        }
    }

    /// Returns true if all four values are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYWH")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}

/// An axis-aligned box described by its center and size.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxCXCYWH<TSpace> {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxCXCYWH<TSpace> {
    #[inline]
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            _space: PhantomData,
        }
    }

    /// Returns the four values in label order.
    #[inline]
    pub fn to_tuple(&self) -> (f64, f64, f64, f64) {
        (self.cx, self.cy, self.w, self.h)
    }
}

impl<TSpace> std::fmt::Debug for BBoxCXCYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxCXCYWH")
            .field("cx", &self.cx)
            .field("cy", &self.cy)
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}

impl BBoxXYWH<Pixel> {
    /// Converts a top-left pixel box into a normalized center box.
    ///
    /// The result is not clamped; see [`BBoxCXCYWH::is_within_unit`].
    ///
    /// # Arguments
    /// * `image_width` - The width of the image in pixels
    /// * `image_height` - The height of the image in pixels
    pub fn to_normalized_center(
        &self,
        image_width: f64,
        image_height: f64,
    ) -> BBoxCXCYWH<Normalized> {
        BBoxCXCYWH::new(
            (self.x + self.w / 2.0) / image_width,
            (self.y + self.h / 2.0) / image_height,
            self.w / image_width,
            self.h / image_height,
        )
    }
}

impl BBoxCXCYWH<Normalized> {
    /// Returns true if every value is finite and inside `[0, 1]`.
    pub fn is_within_unit(&self) -> bool {
        [self.cx, self.cy, self.w, self.h]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}
