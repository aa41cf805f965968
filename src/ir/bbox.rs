//! Axis-aligned bounding boxes in pixel XYXY form.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box `(xmin, ymin, xmax, ymax)` in pixels.
///
/// The constructor does not check that min <= max. Parsed documents are
/// represented as they were written; consumers that need a well-formed region
/// call [`BoundingBox::is_ordered`] or [`BoundingBox::clamped_region`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from explicit coordinates.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Returns the width of the bounding box.
    ///
    /// May be negative if the box is malformed (xmax < xmin).
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Returns the height of the bounding box.
    ///
    /// May be negative if the box is malformed (ymax < ymin).
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns true if all coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// Returns true if min <= max on both axes.
    pub fn is_ordered(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    /// Returns `(left, top, width, height)` with width and height rounded to
    /// two decimals, as used by the detection JSON export.
    pub fn to_ltwh_rounded(&self) -> (f64, f64, f64, f64) {
        (
            self.xmin,
            self.ymin,
            round2(self.width()),
            round2(self.height()),
        )
    }

    /// Integer pixel region `(x, y, width, height)` of this box clipped to an
    /// image of the given size.
    ///
    /// Returns `None` when the box is not finite, not ordered, or when the
    /// clipped region is empty.
    pub fn clamped_region(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        if !self.is_finite() || !self.is_ordered() {
            return None;
        }

        let clamp = |value: f64, limit: u32| value.round().clamp(0.0, limit as f64) as u32;
        let x0 = clamp(self.xmin, image_width);
        let y0 = clamp(self.ymin, image_height);
        let x1 = clamp(self.xmax, image_width);
        let y1 = clamp(self.ymax, image_height);

        (x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
