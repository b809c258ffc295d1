//! Extraction configuration.
//!
//! Every threshold the heuristics use lives here with its default from
//! [`crate::defaults`]. The whole tree deserializes from TOML with missing
//! keys falling back to defaults.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::errors::ConfigError;
use crate::types::positive;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    pub calibration: CalibrationStandard,
    pub marker: MarkerOptions,
    pub stack: StackOptions,
    pub normalize: NormalizeOptions,
    pub metadata: MetadataOptions,
}

impl ExtractConfig {
    /// Reject values no heuristic can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |name: &'static str, v: f64| {
            positive(v)
                .map(|_| ())
                .map_err(|source| ConfigError::InvalidValue { name, source })
        };
        check("calibration.amplitude_mv", self.calibration.amplitude_mv)?;
        check("calibration.duration_s", self.calibration.duration_s)?;
        check("marker.band_fraction", self.marker.band_fraction)?;
        check("marker.min_height_px", self.marker.min_height_px)?;
        check("marker.min_width_px", self.marker.min_width_px)?;
        check("marker.axis_tolerance_px", self.marker.axis_tolerance_px)?;
        check("stack.join_tolerance_px", self.stack.join_tolerance_px)?;
        check("stack.label_search_radius_px", self.stack.label_search_radius_px)?;
        check("stack.x_resolution_px", self.stack.x_resolution_px)?;
        check("metadata.line_tolerance_px", self.metadata.line_tolerance_px)?;
        if self.stack.leads.is_empty() {
            return Err(ConfigError::NoLeads);
        }
        Ok(())
    }
}

/// What the calibration marker stands for on paper
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationStandard {
    /// Amplitude represented by the marker height
    pub amplitude_mv: f64,
    /// Duration represented by the marker plateau width
    pub duration_s: f64,
}

impl Default for CalibrationStandard {
    fn default() -> Self {
        Self {
            amplitude_mv: defaults::MARKER_AMPLITUDE_MV,
            duration_s: defaults::MARKER_DURATION_S,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerOptions {
    pub band_fraction: f64,
    pub min_height_px: f64,
    pub min_width_px: f64,
    pub ambiguity_ratio: f64,
    pub axis_tolerance_px: f64,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            band_fraction: defaults::MARKER_BAND_FRACTION,
            min_height_px: defaults::MARKER_MIN_HEIGHT,
            min_width_px: defaults::MARKER_MIN_WIDTH,
            ambiguity_ratio: defaults::MARKER_AMBIGUITY_RATIO,
            axis_tolerance_px: defaults::AXIS_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackOptions {
    /// Expected lead labels, in output order
    pub leads: Vec<String>,
    pub join_tolerance_px: f64,
    pub label_search_radius_px: f64,
    pub x_resolution_px: f64,
    pub min_samples: usize,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            leads: defaults::STANDARD_LEADS.iter().map(|s| s.to_string()).collect(),
            join_tolerance_px: defaults::JOIN_TOLERANCE,
            label_search_radius_px: defaults::LABEL_SEARCH_RADIUS,
            x_resolution_px: defaults::X_RESOLUTION,
            min_samples: defaults::MIN_SAMPLES,
        }
    }
}

/// Where time zero sits for each lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeOrigin {
    /// x = 0 of the drawing
    #[default]
    Drawing,
    /// The first sample of the lead
    LeadStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    pub time_origin: TimeOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataOptions {
    /// Fraction of the drawing height scanned at the top
    pub top_band: f64,
    /// Fraction of the drawing height scanned at the bottom
    pub bottom_band: f64,
    pub line_tolerance_px: f64,
    pub fields: Vec<MetadataField>,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            top_band: defaults::METADATA_TOP_BAND,
            bottom_band: defaults::METADATA_BOTTOM_BAND,
            line_tolerance_px: defaults::LINE_TOLERANCE,
            fields: default_fields(),
        }
    }
}

/// One metadata field: the first capture group of `pattern` is the value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataField {
    pub name: String,
    pub pattern: String,
    /// An unmatched expected field makes the document partial
    #[serde(default)]
    pub expected: bool,
}

impl MetadataField {
    pub fn new(name: &str, pattern: &str, expected: bool) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            expected,
        }
    }
}

fn default_fields() -> Vec<MetadataField> {
    vec![
        MetadataField::new("ID", r"(?i)\bID\b\s*[:#]?\s*([A-Za-z0-9][\w-]*)", true),
        MetadataField::new("Name", r"(?i)^name\s*:\s*(.+)$", false),
        MetadataField::new(
            "Date",
            r"(\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}(?:\s+\d{1,2}:\d{2}(?::\d{2})?)?)",
            false,
        ),
        MetadataField::new(
            "Heart_Rate",
            r"(?i)(?:vent\.?\s*rate|heart\s*rate|\bHR)\s*:?\s*(\d{2,3})",
            false,
        ),
        MetadataField::new("Scale_x", r"(\d+(?:\.\d+)?\s*mm/s)\b", true),
        MetadataField::new("Scale_y", r"(\d+(?:\.\d+)?\s*mm/mV)", true),
    ]
}
