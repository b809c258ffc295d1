//! `ekgstore`: batch extraction of calibrated ECG waveforms from PDF or SVG
//! printouts.

mod batch;
mod discover;
mod errors;
mod inkscape;
mod logging;
mod output;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use clap::Parser;
use ekgstore::types::positive;
use ekgstore::{ExtractConfig, Pipeline};
use tracing::{debug, info, warn};

use crate::batch::{Batch, progress_bar};
use crate::discover::{InputKind, expand_inputs};
use crate::errors::CliError;
use crate::inkscape::{Converter, Inkscape};
use crate::logging::RunLog;
use crate::output::{Format, Writer};

#[derive(Parser, Debug)]
#[command(
    name = "ekgstore",
    version,
    about = "Extract calibrated ECG waveforms and metadata from PDF/SVG printouts"
)]
struct Args {
    /// Input file, directory or glob pattern (repeatable). Directories are
    /// searched for `*.pdf`.
    #[arg(short, long = "input", value_name = "PATH", default_value = "**/*.pdf")]
    inputs: Vec<String>,

    /// Directory for extracted waveforms and metadata
    #[arg(short, long, value_name = "DIR", default_value = "./output")]
    output: Utf8PathBuf,

    /// Do not write the run log, error CSV or run summary
    #[arg(short = 'x', long)]
    no_logging: bool,

    /// Directory for the run log, error CSV and run summary
    #[arg(long, value_name = "DIR", default_value = ".")]
    log_dir: Utf8PathBuf,

    /// Worker threads (defaults to one per CPU)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Extraction settings (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Seconds before a single PDF conversion is killed
    #[arg(long, value_name = "SECS", default_value = "60", value_parser = parse_seconds)]
    timeout: Duration,

    /// Sample PDF whose conversion time, tripled, becomes the timeout
    #[arg(long, value_name = "PDF")]
    warmup: Option<Utf8PathBuf>,

    /// Inkscape executable
    #[arg(long, value_name = "BIN", default_value = "inkscape")]
    inkscape: String,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> miette::Result<()> {
    miette::set_panic_hook();
    let args = Args::parse();
    let started = Local::now().naive_local();

    let run_log = if args.no_logging {
        None
    } else {
        ensure_dir(&args.log_dir)?;
        Some(RunLog::new(&args.log_dir, started))
    };
    logging::init(run_log.as_ref().map(RunLog::log_path).as_deref())?;
    debug!(?args, "starting");

    let config = load_config(args.config.as_deref())?;
    let pipeline = Pipeline::new(config).map_err(CliError::Config)?;
    ensure_dir(&args.output)?;

    if let Some(jobs) = args.jobs.filter(|&n| n > 0) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let inputs = expand_inputs(&args.inputs)?;
    if inputs.is_empty() {
        warn!(patterns = ?args.inputs, "no input documents found");
    }
    info!(documents = inputs.len(), output = %args.output, "starting batch");

    let converter = if needs_conversion(&inputs) {
        let mut converter = Converter::new(Inkscape::new(&args.inkscape), args.timeout)?;
        if let Some(sample) = &args.warmup {
            converter.warm_up(sample)?;
        }
        Some(converter)
    } else {
        None
    };

    let batch = Batch::new(
        pipeline,
        converter,
        Writer::new(args.output.clone(), args.format),
    );
    let progress = progress_bar(inputs.len(), !args.no_progress);
    let report = batch.run(&inputs, &progress);

    let files: usize = report.outcomes.iter().map(|o| o.written.len()).sum();
    info!(files, output = %args.output, "batch finished");

    let summary = logging::summary(&report, &args.output);
    print!("{summary}");

    if let Some(run_log) = &run_log {
        if let Some(path) = run_log.write_errors(&report)? {
            info!(%path, "wrote error log");
        }
        let path = run_log.write_summary(&report, &args.output)?;
        info!(%path, "wrote run summary");
    }
    Ok(())
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    let secs = positive(secs).map_err(|e| e.to_string())?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Utf8Path>) -> Result<ExtractConfig, CliError> {
    let Some(path) = path else {
        return Ok(ExtractConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigUnreadable {
        path: path.to_owned(),
        source,
    })?;
    let config = toml::from_str(&text).map_err(|source| CliError::ConfigInvalid {
        path: path.to_owned(),
        source,
    })?;
    debug!(%path, "loaded config");
    Ok(config)
}

/// Create `dir` if missing; anything else already at that path is an error
fn ensure_dir(dir: &Utf8Path) -> Result<(), CliError> {
    if dir.exists() && !dir.is_dir() {
        return Err(CliError::OutputNotDirectory {
            path: dir.to_owned(),
        });
    }
    std::fs::create_dir_all(dir).map_err(CliError::io(dir))
}

/// Inkscape is only needed for PDFs without a cached conversion
fn needs_conversion(inputs: &[Utf8PathBuf]) -> bool {
    inputs.iter().any(|path| {
        InputKind::of(path) == Some(InputKind::Pdf) && !Converter::cache_path(path).is_file()
    })
}
