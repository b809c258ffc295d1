//! Strongly-typed numeric primitives for ekgstore (zero-cost newtypes).
//!
//! Pixel geometry stays in `glam::DVec2`; physical quantities only appear
//! through [`ScaleFactors`], which is the single place where pixels turn into
//! seconds and millivolts.

use glam::{DVec2, dvec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Validate that a value is finite and strictly positive.
pub fn positive(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else if val == 0.0 {
        Err(NumericError::Zero)
    } else if val < 0.0 {
        Err(NumericError::Negative)
    } else {
        Ok(val)
    }
}

/// Time in seconds
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    /// Get the raw value
    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Amplitude in millivolts
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Millivolts(pub f64);

impl Millivolts {
    /// Get the raw value
    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Millivolts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mV", self.0)
    }
}

/// Convert drawing pixels to physical units.
///
/// Derived once per document from the calibration marker and applied to
/// every lead of that document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    /// Millivolts per vertical pixel
    pub mv_per_px: f64,
    /// Seconds per horizontal pixel
    pub s_per_px: f64,
}

impl ScaleFactors {
    /// Create scale factors with validation (rejects NaN, infinite, zero, negative)
    pub fn try_new(mv_per_px: f64, s_per_px: f64) -> Result<Self, NumericError> {
        Ok(ScaleFactors {
            mv_per_px: positive(mv_per_px)?,
            s_per_px: positive(s_per_px)?,
        })
    }

    /// Horizontal pixel offset to time
    #[inline]
    pub fn time(&self, dx_px: f64) -> Seconds {
        Seconds(dx_px * self.s_per_px)
    }

    /// Upward pixel offset from the baseline to amplitude
    #[inline]
    pub fn amplitude(&self, rise_px: f64) -> Millivolts {
        Millivolts(rise_px * self.mv_per_px)
    }
}

/// Axis-aligned bounding box in drawing pixels (y grows downward)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl Default for BBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BBox {
    /// Create an empty bounding box (will expand on first point)
    pub fn new() -> Self {
        BBox {
            min: dvec2(f64::MAX, f64::MAX),
            max: dvec2(f64::MIN, f64::MIN),
        }
    }

    /// Bounding box from two corners, in any order
    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        BBox {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Bounding box of a set of points (empty if there are none)
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec2>) -> Self {
        let mut bb = BBox::new();
        for p in points {
            bb.expand_point(*p);
        }
        bb
    }

    /// Check if the bbox is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include a point
    pub fn expand_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand to include another box
    pub fn expand_bbox(&mut self, other: &BBox) {
        if !other.is_empty() {
            self.expand_point(other.min);
            self.expand_point(other.max);
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// True if `other` lies entirely inside this box
    pub fn contains(&self, other: &BBox) -> bool {
        !other.is_empty()
            && other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// True if the boxes overlap (touching edges count)
    pub fn intersects(&self, other: &BBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Euclidean distance from a point to the box (zero inside)
    pub fn distance_to(&self, p: DVec2) -> f64 {
        if self.is_empty() {
            return f64::INFINITY;
        }
        let clamped = p.clamp(self.min, self.max);
        (p - clamped).length()
    }
}
