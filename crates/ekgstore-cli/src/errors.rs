//! Errors of the batch console. Anything here aborts the run before or
//! outside document processing; per-document problems become failures in
//! the document's result instead.

use camino::Utf8PathBuf;
use ekgstore::{ConfigError, ConversionError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error("cannot read config file {path}")]
    #[diagnostic(code(ekgstore::cli::config_unreadable))]
    ConfigUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    #[diagnostic(code(ekgstore::cli::config_invalid))]
    ConfigInvalid {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid input pattern {pattern:?}")]
    #[diagnostic(code(ekgstore::cli::invalid_pattern))]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("output path {path} exists and is not a directory")]
    #[diagnostic(code(ekgstore::cli::output_not_directory))]
    OutputNotDirectory { path: Utf8PathBuf },

    #[error("cannot write {path}")]
    #[diagnostic(code(ekgstore::cli::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write CSV {path}")]
    #[diagnostic(code(ekgstore::cli::csv))]
    Csv {
        path: Utf8PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot write JSON {path}")]
    #[diagnostic(code(ekgstore::cli::json))]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),
}

impl CliError {
    pub fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> CliError {
        let path = path.into();
        move |source| CliError::Io { path, source }
    }
}
