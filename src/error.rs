use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("graph source not found: {0}")]
    #[diagnostic(help("pass --graph or set \"graph\" in kira-sr.json"))]
    GraphNotFound(PathBuf),

    #[error("failed to read graph source {path}: {message}")]
    GraphRead { path: PathBuf, message: String },

    #[error("failed to parse graph source {path}: {message}")]
    GraphParse { path: PathBuf, message: String },

    #[error("query directory not found: {0}")]
    QueriesDirNotFound(PathBuf),

    #[error("no query files found in {0}")]
    NoQueries(PathBuf),

    #[error("failed to read query file {path}: {message}")]
    QueryRead { path: PathBuf, message: String },

    #[error("failed to read prefix file {path}: {message}")]
    PrefixRead { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("RDF store error: {0}")]
    Store(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl RunnerError {
    /// Precondition failures that prevent any query from running.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, RunnerError::Store(_) | RunnerError::Filesystem(_))
    }
}
