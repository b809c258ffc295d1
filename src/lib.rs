//! Extract calibrated ECG waveforms and metadata from vector drawings of
//! scanned ECG printouts.
//!
//! ```no_run
//! use ekgstore::{ExtractConfig, Pipeline};
//!
//! let pipeline = Pipeline::new(ExtractConfig::default())?;
//! let svg = std::fs::read_to_string("ecg.pdf.svg").unwrap();
//! let result = pipeline.process_source("ecg", &svg);
//! for row in result.waveform_rows() {
//!     println!("{},{},{}", row.lead, row.time_s, row.amplitude_mv);
//! }
//! # Ok::<(), ekgstore::ConfigError>(())
//! ```

pub mod config;
pub mod defaults;
pub mod drawing;
pub mod errors;
pub mod log;
pub mod marker;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod stack;
pub mod table;
pub mod types;

pub use config::{
    CalibrationStandard, ExtractConfig, MarkerOptions, MetadataField, MetadataOptions,
    NormalizeOptions, StackOptions, TimeOrigin,
};
pub use drawing::{Drawing, DrawingElement, Element, ElementId, PathElement, TextElement};
pub use errors::{
    CalibrationError, ConfigError, ConversionError, Error, ExtractionError,
    MalformedDocumentError, MetadataError,
};
pub use marker::{CalibrationMarker, is_marker_shape, locate_marker};
pub use metadata::{MetadataExtractor, MetadataRecord};
pub use normalize::{NormalizedWaveform, Sample, normalize};
pub use pipeline::{DocumentResult, Failure, FailureTarget, Pipeline, Status};
pub use stack::{ContinuationRank, LeadStack, Stack, build_stack, process_stack};
pub use table::{MetadataRow, WaveformRow};
pub use types::{Millivolts, ScaleFactors, Seconds};
