//! Per-document output files.

use std::fs::File;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use ekgstore::{DocumentResult, Status};
use serde::Serialize;

use crate::errors::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// `<id>.csv` waveform rows plus `<id>_meta.csv` metadata rows
    #[default]
    Csv,
    /// One `<id>.json` object with status, failures, metadata and leads
    Json,
}

#[derive(Debug, Clone)]
pub struct Writer {
    dir: Utf8PathBuf,
    format: Format,
}

impl Writer {
    pub fn new(dir: impl Into<Utf8PathBuf>, format: Format) -> Self {
        Writer {
            dir: dir.into(),
            format,
        }
    }

    /// Write the files for one document and return their paths.
    ///
    /// A failed document has no rows, so the CSV format writes nothing for it;
    /// JSON always records the status and reasons.
    pub fn write(&self, result: &DocumentResult) -> Result<Vec<Utf8PathBuf>, CliError> {
        match self.format {
            Format::Csv if result.status == Status::Failed => Ok(Vec::new()),
            Format::Csv => {
                let waves = self.dir.join(format!("{}.csv", result.document_id));
                write_csv(&waves, result.waveform_rows())?;
                let meta = self.dir.join(format!("{}_meta.csv", result.document_id));
                write_csv(&meta, result.metadata_rows())?;
                Ok(vec![waves, meta])
            }
            Format::Json => {
                let path = self.dir.join(format!("{}.json", result.document_id));
                let file = File::create(&path).map_err(CliError::io(&path))?;
                let mut out = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut out, result).map_err(|source| {
                    CliError::Json {
                        path: path.clone(),
                        source,
                    }
                })?;
                out.write_all(b"\n")
                    .and_then(|()| out.flush())
                    .map_err(CliError::io(&path))?;
                Ok(vec![path])
            }
        }
    }
}

fn write_csv<R: Serialize>(
    path: &Utf8Path,
    rows: impl Iterator<Item = R>,
) -> Result<(), CliError> {
    let csv_err = |source| CliError::Csv {
        path: path.to_owned(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(CliError::io(path))
}
