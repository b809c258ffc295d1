//! Per-document orchestration and the result record.
//!
//! Marker location, stroke grouping and metadata extraction only read the
//! drawing, so they fork under `rayon::join`; normalization joins the marker
//! and the grouped leads. Failures never escape as errors: they become the
//! document's [`Status`] and itemized [`Failure`] list.

use miette::Diagnostic;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ExtractConfig;
use crate::drawing::Drawing;
use crate::errors::{ConfigError, MetadataError};
use crate::log::{debug, info};
use crate::marker::{CalibrationMarker, locate_marker};
use crate::metadata::{MetadataExtractor, MetadataRecord};
use crate::normalize::{NormalizedWaveform, normalize};
use crate::stack::{build_stack, process_stack};
use crate::types::ScaleFactors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Calibrated, every expected lead and expected field resolved
    Full,
    /// Calibrated, but some leads or fields failed
    Partial,
    /// Nothing could be normalized
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Full => "full",
            Status::Partial => "partial",
            Status::Failed => "failed",
        })
    }
}

/// What a failure applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "name", rename_all = "lowercase")]
pub enum FailureTarget {
    Document,
    Lead(String),
    Field(String),
}

impl FailureTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureTarget::Document => "document",
            FailureTarget::Lead(_) => "lead",
            FailureTarget::Field(_) => "field",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FailureTarget::Document => None,
            FailureTarget::Lead(name) | FailureTarget::Field(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    #[serde(flatten)]
    pub target: FailureTarget,
    /// Diagnostic code, e.g. `ekgstore::calibration::ambiguous`
    pub kind: String,
    pub reason: String,
}

impl Failure {
    pub fn new(target: FailureTarget, err: &dyn Diagnostic) -> Self {
        Failure {
            target,
            kind: err
                .code()
                .map_or_else(|| "ekgstore::unknown".to_string(), |c| c.to_string()),
            reason: err.to_string(),
        }
    }

    pub fn document(err: &dyn Diagnostic) -> Self {
        Self::new(FailureTarget::Document, err)
    }
}

/// Everything extracted from one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResult {
    pub document_id: String,
    pub status: Status,
    pub metadata: MetadataRecord,
    pub scale: Option<ScaleFactors>,
    pub marker: Option<CalibrationMarker>,
    /// Resolved leads, in expected-lead order
    pub waveforms: Vec<NormalizedWaveform>,
    pub failures: Vec<Failure>,
}

impl DocumentResult {
    pub fn waveform(&self, lead: &str) -> Option<&NormalizedWaveform> {
        self.waveforms.iter().find(|w| w.lead == lead)
    }
}

/// Configured extraction, shared read-only across documents
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ExtractConfig,
    metadata: MetadataExtractor,
}

impl Pipeline {
    pub fn new(config: ExtractConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let metadata = MetadataExtractor::new(&config.metadata)?;
        Ok(Pipeline { config, metadata })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Parse and process SVG text; an unreadable drawing yields a failed result
    pub fn process_source(&self, document_id: &str, svg: &str) -> DocumentResult {
        match Drawing::parse_named(document_id, svg) {
            Ok(drawing) => self.process(document_id, &drawing),
            Err(err) => self.failed(document_id, &err),
        }
    }

    /// A failed result for a document that never reached extraction
    pub fn failed(&self, document_id: &str, err: &dyn Diagnostic) -> DocumentResult {
        info!(document = document_id, %err, "document failed");
        DocumentResult {
            document_id: document_id.to_string(),
            status: Status::Failed,
            metadata: self.metadata.empty_record(),
            scale: None,
            marker: None,
            waveforms: Vec::new(),
            failures: vec![Failure::document(err)],
        }
    }

    pub fn process(&self, document_id: &str, drawing: &Drawing) -> DocumentResult {
        let config = &self.config;
        let (calibration, (stack, metadata)) = rayon::join(
            || locate_marker(drawing, &config.calibration, &config.marker),
            || {
                rayon::join(
                    || build_stack(drawing, &config.stack, &config.marker),
                    || self.metadata.extract(drawing),
                )
            },
        );

        let mut failures = Vec::new();
        let metadata = match metadata {
            Ok(record) => record,
            Err(err) => {
                failures.push(Failure::document(&err));
                self.metadata.empty_record()
            }
        };

        let (marker, scale) = match calibration {
            Ok(found) => found,
            Err(err) => {
                info!(document = document_id, %err, "calibration failed");
                failures.insert(0, Failure::document(&err));
                return DocumentResult {
                    document_id: document_id.to_string(),
                    status: Status::Failed,
                    metadata,
                    scale: None,
                    marker: None,
                    waveforms: Vec::new(),
                    failures,
                };
            }
        };

        let mut leads = Vec::new();
        for outcome in process_stack(&stack, &config.stack.leads) {
            match outcome {
                Ok(lead) => leads.push(lead),
                Err(err) => failures.push(Failure::new(
                    FailureTarget::Lead(err.lead().to_string()),
                    &err,
                )),
            }
        }
        let waveforms: Vec<NormalizedWaveform> = leads
            .par_iter()
            .map(|lead| normalize(lead, &scale, marker.baseline_y, &config.normalize))
            .collect();

        if !failures.iter().any(|f| f.kind == "ekgstore::metadata::no_text_regions") {
            for field in self.metadata.expected_fields() {
                if metadata.get(field).is_none() {
                    let err = MetadataError::MissingField {
                        field: field.to_string(),
                    };
                    failures.push(Failure::new(FailureTarget::Field(field.to_string()), &err));
                }
            }
        }

        let status = if failures.is_empty() {
            Status::Full
        } else {
            Status::Partial
        };
        debug!(
            document = document_id,
            leads = waveforms.len(),
            failures = failures.len(),
            "document extracted"
        );
        info!(document = document_id, %status, "processed document");

        DocumentResult {
            document_id: document_id.to_string(),
            status,
            metadata,
            scale: Some(scale),
            marker: Some(marker),
            waveforms,
            failures,
        }
    }
}
