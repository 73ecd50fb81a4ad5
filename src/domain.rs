use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Shape of a query as detected from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryKind {
    Select,
    Ask,
    Construct,
    Describe,
    Unknown,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Ask => "ASK",
            QueryKind::Construct => "CONSTRUCT",
            QueryKind::Describe => "DESCRIBE",
            QueryKind::Unknown => "UNKNOWN",
        }
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, QueryKind::Construct | QueryKind::Describe)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CompatMode {
    Off,
    #[default]
    Auto,
    On,
}

impl fmt::Display for CompatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatMode::Off => write!(f, "off"),
            CompatMode::Auto => write!(f, "auto"),
            CompatMode::On => write!(f, "on"),
        }
    }
}

impl FromStr for CompatMode {
    type Err = RunnerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(CompatMode::Off),
            "auto" => Ok(CompatMode::Auto),
            "on" => Ok(CompatMode::On),
            _ => Err(RunnerError::InvalidOption(format!(
                "compat mode must be off|auto|on, got {value}"
            ))),
        }
    }
}

/// Export formats for tabular results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

/// Which catalog wins when the graph and the external prefix file bind the
/// same prefix name to different namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrefixPrecedence {
    #[default]
    Graph,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    ConfigurationError,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 1,
            RunStatus::ConfigurationError => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialFailure => write!(f, "partial-failure"),
            RunStatus::ConfigurationError => write!(f, "configuration-error"),
        }
    }
}

/// Filesystem-safe directory name for a query.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            if ch == '_' {
                pending_sep = true;
                continue;
            }
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        "query".to_string()
    } else {
        slug
    }
}
