//! Console and run-log setup.
//!
//! Every run leaves three files in the log directory unless `-x` is given:
//! the full debug trace, a CSV with one row per failure, and a plain-text
//! summary that is overwritten by the next run.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::batch::BatchReport;
use crate::errors::CliError;

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CONSOLE_FILTER: &str = "info,ekgstore=warn,ekgstore_cli=info";

/// Install the global subscriber: stderr console, plus a full debug log file
/// when `log_file` is given. `RUST_LOG` overrides the console filter.
pub fn init(log_file: Option<&Utf8Path>) -> Result<(), CliError> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(CONSOLE_FILTER));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(CliError::io(path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
    Ok(())
}

/// File names of one run, all stamped with its start time
#[derive(Debug, Clone)]
pub struct RunLog {
    dir: Utf8PathBuf,
    stamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorRow<'a> {
    timestamp: String,
    document: &'a str,
    source: &'a str,
    status: String,
    target: &'static str,
    name: Option<&'a str>,
    kind: &'a str,
    reason: &'a str,
}

impl RunLog {
    pub fn new(dir: impl Into<Utf8PathBuf>, started: NaiveDateTime) -> Self {
        RunLog {
            dir: dir.into(),
            stamp: started.format(STAMP_FORMAT).to_string(),
        }
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("EKG_Extraction_{}.log", self.stamp))
    }

    pub fn errors_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("EKG_Extraction_Errors_{}.csv", self.stamp))
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.dir.join("EKG_Run_Summary.txt")
    }

    /// One row per failure of every failed or partial document. Nothing is
    /// written when the whole batch succeeded.
    pub fn write_errors(&self, report: &BatchReport) -> Result<Option<Utf8PathBuf>, CliError> {
        if report.outcomes.iter().all(|o| o.failures.is_empty()) {
            return Ok(None);
        }

        let path = self.errors_path();
        let csv_err = |source| CliError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
        for outcome in &report.outcomes {
            for failure in &outcome.failures {
                writer
                    .serialize(ErrorRow {
                        timestamp: outcome.finished.format(ROW_TIME_FORMAT).to_string(),
                        document: &outcome.document_id,
                        source: outcome.source.as_str(),
                        status: outcome.status.to_string(),
                        target: failure.target.kind(),
                        name: failure.target.name(),
                        kind: &failure.kind,
                        reason: &failure.reason,
                    })
                    .map_err(csv_err)?;
            }
        }
        writer.flush().map_err(CliError::io(&path))?;
        Ok(Some(path))
    }

    pub fn write_summary(
        &self,
        report: &BatchReport,
        output_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, CliError> {
        let path = self.summary_path();
        let mut file = File::create(&path).map_err(CliError::io(&path))?;
        file.write_all(summary(report, output_dir).as_bytes())
            .map_err(CliError::io(&path))?;
        Ok(path)
    }
}

/// Plain-text run summary
pub fn summary(report: &BatchReport, output_dir: &Utf8Path) -> String {
    let counts = report.counts();
    format!(
        "Succeeded: {}\nPartial: {}\nErrored: {}\nTotal: {}\nOutput dir: {}\nElapsed: {:.2}s\n",
        counts.full,
        counts.partial,
        counts.failed,
        counts.total(),
        output_dir,
        report.elapsed.as_secs_f64(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Outcome;
    use chrono::NaiveDate;
    use ekgstore::{Failure, FailureTarget, Status};
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    fn failure(target: FailureTarget, kind: &str, reason: &str) -> Failure {
        Failure {
            target,
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    fn report() -> BatchReport {
        BatchReport {
            outcomes: vec![
                Outcome {
                    document_id: "a".into(),
                    source: "in/a.pdf".into(),
                    status: Status::Full,
                    failures: vec![],
                    written: vec![],
                    finished: at(9, 0, 1),
                },
                Outcome {
                    document_id: "b".into(),
                    source: "in/b.pdf".into(),
                    status: Status::Partial,
                    failures: vec![failure(
                        FailureTarget::Lead("V6".into()),
                        "ekgstore::extraction::label_not_found",
                        "lead V6: no label in the drawing",
                    )],
                    written: vec![],
                    finished: at(9, 0, 2),
                },
                Outcome {
                    document_id: "c".into(),
                    source: "in/c.pdf".into(),
                    status: Status::Failed,
                    failures: vec![failure(
                        FailureTarget::Document,
                        "ekgstore::conversion::timed_out",
                        "conversion of in/c.pdf timed out after 3.0s",
                    )],
                    written: vec![],
                    finished: at(9, 0, 3),
                },
            ],
            elapsed: Duration::from_millis(4250),
        }
    }

    #[test]
    fn file_names_carry_the_start_stamp() {
        let log = RunLog::new("logs", at(13, 7, 9));
        assert_eq!(log.log_path(), "logs/EKG_Extraction_20240305130709.log");
        assert_eq!(
            log.errors_path(),
            "logs/EKG_Extraction_Errors_20240305130709.csv"
        );
        assert_eq!(log.summary_path(), "logs/EKG_Run_Summary.txt");
    }

    #[test]
    fn summary_counts_each_status() {
        insta::assert_snapshot!(summary(&report(), Utf8Path::new("output")), @r"
        Succeeded: 1
        Partial: 1
        Errored: 1
        Total: 3
        Output dir: output
        Elapsed: 4.25s
        ");
    }

    #[test]
    fn error_csv_lists_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let log = RunLog::new(&root, at(9, 0, 0));

        let path = log.write_errors(&report()).unwrap().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        insta::assert_snapshot!(text, @r"
        timestamp,document,source,status,target,name,kind,reason
        2024-03-05 09:00:02,b,in/b.pdf,partial,lead,V6,ekgstore::extraction::label_not_found,lead V6: no label in the drawing
        2024-03-05 09:00:03,c,in/c.pdf,failed,document,,ekgstore::conversion::timed_out,conversion of in/c.pdf timed out after 3.0s
        ");
    }

    #[test]
    fn clean_batches_write_no_error_csv() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut report = report();
        report.outcomes.truncate(1);
        assert!(RunLog::new(&root, at(9, 0, 0)).write_errors(&report).unwrap().is_none());
    }
}
