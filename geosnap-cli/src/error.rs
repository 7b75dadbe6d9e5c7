//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the terminal. The process exits non-zero on any of
/// these.
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or contradictory command-line configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The config file failed to load or validate.
    #[error(transparent)]
    ConfigFile(#[from] geosnap::config::ConfigError),

    /// A token file could not be read.
    #[error("failed to read token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A client could not be constructed.
    #[error("failed to set up clients: {0}")]
    Setup(String),

    /// The pipeline run failed.
    #[error(transparent)]
    Pipeline(#[from] geosnap::PipelineError),

    /// The dispatch server failed to start or crashed.
    #[error("server error: {0}")]
    Server(String),
}
