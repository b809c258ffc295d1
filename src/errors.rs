//! Error types with rich diagnostics using miette
//!
//! Document-fatal errors (malformed drawing, calibration, conversion) stop one
//! document. Lead-local and field-local errors are collected into the
//! [`DocumentResult`](crate::DocumentResult) instead of being thrown.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::types::NumericError;

/// Source context for error reporting
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (document id or "<input>")
    pub name: String,
    /// The full source text
    pub source: String,
}

impl SourceContext {
    /// Create a new source context
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create a NamedSource for miette
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }

    /// Byte offset of a 1-based row/column position
    pub fn offset_of(&self, row: usize, col: usize) -> usize {
        let line_start: usize = self
            .source
            .split_inclusive('\n')
            .take(row.saturating_sub(1))
            .map(str::len)
            .sum();
        (line_start + col.saturating_sub(1)).min(self.source.len())
    }
}

// ============================================================================
// Drawing Errors
// ============================================================================

/// The input cannot be read as a vector drawing
#[derive(Error, Diagnostic, Debug)]
pub enum MalformedDocumentError {
    #[error("invalid XML: {message}")]
    #[diagnostic(code(ekgstore::drawing::invalid_xml))]
    InvalidXml {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("root element is <{found}>, expected <svg>")]
    #[diagnostic(code(ekgstore::drawing::not_svg))]
    NotSvg {
        found: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("root element")]
        span: SourceSpan,
    },

    #[error("invalid path data: {message}")]
    #[diagnostic(code(ekgstore::drawing::invalid_path_data))]
    InvalidPathData {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("in this element")]
        span: SourceSpan,
    },

    #[error("invalid number {value:?} in attribute `{attribute}`")]
    #[diagnostic(code(ekgstore::drawing::invalid_number))]
    InvalidNumber {
        attribute: String,
        value: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("in this element")]
        span: SourceSpan,
    },
}

// ============================================================================
// Calibration Errors
// ============================================================================

/// The calibration marker could not be resolved; nothing can be normalized
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("no calibration marker in the leftmost {band_px:.1}px of the drawing")]
    #[diagnostic(
        code(ekgstore::calibration::no_candidate),
        help("the marker must be a rectangular or stepped pulse at least {min_height}px tall and {min_width}px wide")
    )]
    NoCandidate {
        band_px: f64,
        min_height: f64,
        min_width: f64,
    },

    #[error("ambiguous calibration marker: {count} equally plausible candidates")]
    #[diagnostic(
        code(ekgstore::calibration::ambiguous),
        help("narrow the marker band or raise the minimum marker size")
    )]
    Ambiguous { count: usize },

    #[error("calibration marker yields an invalid scale")]
    #[diagnostic(code(ekgstore::calibration::invalid_scale))]
    InvalidScale {
        #[source]
        source: NumericError,
    },
}

// ============================================================================
// Extraction Errors
// ============================================================================

/// One lead could not be traced; other leads are unaffected
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("lead {lead}: no label in the drawing")]
    #[diagnostic(code(ekgstore::extraction::label_not_found))]
    LabelNotFound { lead: String },

    #[error("lead {lead}: no path cluster within {radius}px of its label")]
    #[diagnostic(code(ekgstore::extraction::no_path_cluster))]
    NoPathCluster { lead: String, radius: f64 },

    #[error("lead {lead}: label appears more than once")]
    #[diagnostic(
        code(ekgstore::extraction::duplicate_label),
        help("the first occurrence in document order is kept")
    )]
    DuplicateLabel { lead: String },

    #[error("lead {lead}: traced {samples} samples, need at least {min}")]
    #[diagnostic(code(ekgstore::extraction::too_few_samples))]
    TooFewSamples {
        lead: String,
        samples: usize,
        min: usize,
    },
}

impl ExtractionError {
    /// The lead this error belongs to
    pub fn lead(&self) -> &str {
        match self {
            ExtractionError::LabelNotFound { lead }
            | ExtractionError::NoPathCluster { lead, .. }
            | ExtractionError::DuplicateLabel { lead }
            | ExtractionError::TooFewSamples { lead, .. } => lead,
        }
    }
}

// ============================================================================
// Metadata Errors
// ============================================================================

/// Metadata could not be read; waveforms are unaffected
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("drawing has no text regions")]
    #[diagnostic(code(ekgstore::metadata::no_text_regions))]
    NoTextRegions,

    #[error("expected metadata field {field} not found")]
    #[diagnostic(code(ekgstore::metadata::missing_field))]
    MissingField { field: String },
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// The external document-to-drawing step failed
#[derive(Error, Diagnostic, Debug)]
pub enum ConversionError {
    #[error("`{binary}` binary is required")]
    #[diagnostic(code(ekgstore::conversion::missing_binary))]
    MissingBinary { binary: String },

    #[error("cannot convert {input} to SVG ({status})")]
    #[diagnostic(code(ekgstore::conversion::failed))]
    Failed {
        input: String,
        status: String,
        #[help]
        stderr: Option<String>,
    },

    #[error("conversion of {input} timed out after {seconds:.1}s")]
    #[diagnostic(code(ekgstore::conversion::timed_out))]
    TimedOut { input: String, seconds: f64 },

    #[error("unrecognized version output: {output:?}")]
    #[diagnostic(code(ekgstore::conversion::unknown_version))]
    UnknownVersion { output: String },

    #[error("no arguments supplied")]
    #[diagnostic(code(ekgstore::conversion::no_arguments))]
    NoArguments,

    #[error("I/O error during conversion")]
    #[diagnostic(code(ekgstore::conversion::io))]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Invalid extraction configuration
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("invalid pattern for metadata field {field}")]
    #[diagnostic(code(ekgstore::config::invalid_pattern))]
    InvalidPattern {
        field: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("pattern for metadata field {field} has no capture group")]
    #[diagnostic(
        code(ekgstore::config::missing_capture_group),
        help("wrap the value part of the pattern in parentheses")
    )]
    MissingCaptureGroup { field: String },

    #[error("invalid value for `{name}`")]
    #[diagnostic(code(ekgstore::config::invalid_value))]
    InvalidValue {
        name: &'static str,
        #[source]
        source: NumericError,
    },

    #[error("no expected leads configured")]
    #[diagnostic(code(ekgstore::config::no_leads))]
    NoLeads,
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error the core or its boundary can produce
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Malformed(#[from] MalformedDocumentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}
