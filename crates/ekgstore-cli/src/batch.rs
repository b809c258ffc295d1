//! Document-parallel batch runner.

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use ekgstore::{ConversionError, DocumentResult, Failure, Pipeline, Status};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::discover::{InputKind, document_ids};
use crate::errors::CliError;
use crate::inkscape::Converter;
use crate::output::Writer;

/// What happened to one input
#[derive(Debug, Clone)]
pub struct Outcome {
    pub document_id: String,
    pub source: Utf8PathBuf,
    pub status: Status,
    pub failures: Vec<Failure>,
    pub written: Vec<Utf8PathBuf>,
    pub finished: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub full: usize,
    pub partial: usize,
    pub failed: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.full + self.partial + self.failed
    }
}

/// Outcomes in input order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                Status::Full => counts.full += 1,
                Status::Partial => counts.partial += 1,
                Status::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

pub fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("template is compile-time constant")
            .progress_chars("█▓▒░  "),
    );
    pb
}

pub struct Batch {
    pipeline: Pipeline,
    converter: Option<Converter>,
    writer: Writer,
}

impl Batch {
    pub fn new(pipeline: Pipeline, converter: Option<Converter>, writer: Writer) -> Self {
        Batch {
            pipeline,
            converter,
            writer,
        }
    }

    /// Process every input on the global rayon pool. A bad document only ever
    /// produces a failed outcome.
    pub fn run(&self, inputs: &[Utf8PathBuf], progress: &ProgressBar) -> BatchReport {
        let start = Instant::now();
        let ids = document_ids(inputs);
        let outcomes = inputs
            .par_iter()
            .zip(ids)
            .map(|(path, id)| {
                let outcome = self.process(path, id);
                progress.inc(1);
                outcome
            })
            .collect();
        progress.finish_and_clear();

        BatchReport {
            outcomes,
            elapsed: start.elapsed(),
        }
    }

    fn process(&self, path: &Utf8Path, id: String) -> Outcome {
        debug!(document = %id, %path, "processing");

        let mut result = match self.load(path) {
            Ok(svg) => self.pipeline.process_source(&id, &svg),
            Err(err) => self.pipeline.failed(&id, &err),
        };

        let written = match self.writer.write(&result) {
            Ok(written) => written,
            Err(err) => {
                result.status = Status::Failed;
                result.failures.push(Failure::document(&err));
                Vec::new()
            }
        };

        log_result(path, &result);
        Outcome {
            document_id: result.document_id,
            source: path.to_owned(),
            status: result.status,
            failures: result.failures,
            written,
            finished: Local::now().naive_local(),
        }
    }

    /// SVG text of one input, converting PDFs first
    fn load(&self, path: &Utf8Path) -> Result<String, CliError> {
        let svg = match (InputKind::of(path), &self.converter) {
            (Some(InputKind::Pdf), Some(converter)) => converter.svg_for(path)?,
            (Some(InputKind::Pdf), None) => {
                return Err(ConversionError::MissingBinary {
                    binary: "inkscape".into(),
                }
                .into());
            }
            _ => path.to_owned(),
        };
        std::fs::read_to_string(&svg).map_err(CliError::io(&svg))
    }
}

fn log_result(path: &Utf8Path, result: &DocumentResult) {
    match result.status {
        Status::Full => info!(document = %result.document_id, "extracted all leads"),
        status => {
            warn!(
                document = %result.document_id,
                %path,
                %status,
                failures = result.failures.len(),
                "incomplete extraction"
            );
            for failure in &result.failures {
                warn!(
                    document = %result.document_id,
                    target = failure.target.kind(),
                    name = failure.target.name(),
                    kind = %failure.kind,
                    "{}",
                    failure.reason
                );
            }
        }
    }
}
