use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{CompatMode, ExportFormat, PrefixPrecedence};
use crate::error::RunnerError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-sr.json";
pub const DEFAULT_GRAPH: &str = "data/rdf/export.ttl";
pub const DEFAULT_QUERIES: &str = "queries/sparql";
pub const DEFAULT_OUT: &str = "results/rdflib-sparql";

/// On-disk run configuration. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default)]
    pub queries: Option<String>,
    #[serde(default)]
    pub out: Option<String>,
    #[serde(default)]
    pub prefixes: Option<String>,
    #[serde(default)]
    pub formats: Option<Vec<ExportFormat>>,
    #[serde(default)]
    pub recursive: Option<bool>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub compat: Option<CompatMode>,
    #[serde(default)]
    pub prefix_precedence: Option<PrefixPrecedence>,
    #[serde(default)]
    pub query_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub only: Option<Vec<String>>,
}

/// Command-line values. `None`/`false`/empty means "not given" and leaves the
/// config file value in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub graph: Option<String>,
    pub queries: Option<String>,
    pub out: Option<String>,
    pub prefixes: Option<String>,
    pub formats: Vec<ExportFormat>,
    pub recursive: bool,
    pub fail_fast: bool,
    pub dry_run: bool,
    pub compat: Option<CompatMode>,
    pub prefix_precedence: Option<PrefixPrecedence>,
    pub only: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub graph: Utf8PathBuf,
    pub queries: Utf8PathBuf,
    pub out: Utf8PathBuf,
    pub prefixes: Option<Utf8PathBuf>,
    pub formats: Vec<ExportFormat>,
    pub recursive: bool,
    pub fail_fast: bool,
    pub dry_run: bool,
    pub compat: CompatMode,
    pub prefix_precedence: PrefixPrecedence,
    pub query_extensions: Vec<String>,
    pub only: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-sr.json` in the current directory when no path
    /// is given. Only an explicitly requested file has to exist.
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<ResolvedConfig, RunnerError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            tracing::debug!(config = %config_path.display(), "loading config");
            let content = fs::read_to_string(&config_path)
                .map_err(|_| RunnerError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| RunnerError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(config: Config, overrides: Overrides) -> Result<ResolvedConfig, RunnerError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(RunnerError::InvalidOption(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let mut formats = if !overrides.formats.is_empty() {
            overrides.formats
        } else {
            config.formats.unwrap_or_else(default_formats)
        };
        formats.sort_by_key(|format| format.to_string());
        formats.dedup();

        let query_extensions = config
            .query_extensions
            .unwrap_or_else(|| vec!["rq".to_string()])
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect::<Vec<_>>();
        if query_extensions.is_empty() {
            return Err(RunnerError::InvalidOption(
                "query_extensions must name at least one extension".to_string(),
            ));
        }

        let only = if !overrides.only.is_empty() {
            overrides.only
        } else {
            config.only.unwrap_or_default()
        };

        Ok(ResolvedConfig {
            schema_version,
            graph: Utf8PathBuf::from(
                overrides
                    .graph
                    .or(config.graph)
                    .unwrap_or_else(|| DEFAULT_GRAPH.to_string()),
            ),
            queries: Utf8PathBuf::from(
                overrides
                    .queries
                    .or(config.queries)
                    .unwrap_or_else(|| DEFAULT_QUERIES.to_string()),
            ),
            out: Utf8PathBuf::from(
                overrides
                    .out
                    .or(config.out)
                    .unwrap_or_else(|| DEFAULT_OUT.to_string()),
            ),
            prefixes: overrides.prefixes.or(config.prefixes).map(Utf8PathBuf::from),
            formats,
            recursive: overrides.recursive || config.recursive.unwrap_or(false),
            fail_fast: overrides.fail_fast || config.fail_fast.unwrap_or(false),
            dry_run: overrides.dry_run || config.dry_run.unwrap_or(false),
            compat: overrides.compat.or(config.compat).unwrap_or_default(),
            prefix_precedence: overrides
                .prefix_precedence
                .or(config.prefix_precedence)
                .unwrap_or_default(),
            query_extensions,
            only,
        })
    }
}

pub fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Csv, ExportFormat::Json]
}
