//! Default thresholds and the default calibration standard (drawing pixels
//! unless noted otherwise)

/// Amplitude represented by the marker height, in millivolts
pub const MARKER_AMPLITUDE_MV: f64 = 1.0;
/// Duration represented by the marker plateau width, in seconds
pub const MARKER_DURATION_S: f64 = 0.04;

/// Fraction of the drawing width, from the left edge, searched for the marker
pub const MARKER_BAND_FRACTION: f64 = 0.15;
pub const MARKER_MIN_HEIGHT: f64 = 2.0;
pub const MARKER_MIN_WIDTH: f64 = 1.0;
/// Relative area margin the best marker candidate needs over the runner-up
pub const MARKER_AMBIGUITY_RATIO: f64 = 0.1;
/// Slack for treating a segment as horizontal or vertical
pub const AXIS_TOLERANCE: f64 = 0.5;

/// Maximum gap between a trace end point and the next segment's start
pub const JOIN_TOLERANCE: f64 = 1.0;
pub const LABEL_SEARCH_RADIUS: f64 = 200.0;
/// Quantum for deciding that two samples share an x coordinate
pub const X_RESOLUTION: f64 = 0.001;
pub const MIN_SAMPLES: usize = 2;

/// The twelve standard leads in print order
pub const STANDARD_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Fraction of the drawing height scanned for metadata at the top
pub const METADATA_TOP_BAND: f64 = 0.25;
/// Fraction of the drawing height scanned for metadata at the bottom
pub const METADATA_BOTTOM_BAND: f64 = 0.1;
/// Text anchors closer than this vertically are joined into one line
pub const LINE_TOLERANCE: f64 = 2.0;
