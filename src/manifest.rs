use std::fmt::Write as _;

use camino::Utf8Path;
use serde::Serialize;

use crate::compat::CompatReport;
use crate::domain::{CompatMode, ExportFormat, PrefixPrecedence, QueryKind, RunStatus};
use crate::error::RunnerError;
use crate::store::OutputStore;

pub const TOOL_NAME: &str = "kira-sr";
pub const ENGINE_NAME: &str = "oxigraph";

/// Outcome of one query. Built once when the query finishes.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub query_file: String,
    pub query_name: String,
    pub query_type: QueryKind,
    pub ok: bool,
    pub duration_ms: u64,
    pub rows: usize,
    pub cols: usize,
    pub outputs: Vec<String>,
    pub artifacts_written: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    pub cwd: String,
    pub os: String,
    pub arch: String,
    pub engine: String,
}

impl Environment {
    pub fn detect() -> Self {
        let cwd = std::env::current_dir()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        Self {
            cwd,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            engine: ENGINE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sources {
    pub graph: String,
    pub queries: String,
    pub out: String,
    pub prefixes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub compat: CompatMode,
    pub formats: Vec<ExportFormat>,
    pub recursive: bool,
    pub fail_fast: bool,
    pub dry_run: bool,
    pub prefix_precedence: PrefixPrecedence,
    pub only: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TripleCounts {
    /// As loaded from the graph source.
    pub source: usize,
    /// After materialization, what the queries ran against.
    pub working: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueryCounts {
    pub discovered: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub tool: String,
    pub version: String,
    pub timestamp_utc: String,
    pub environment: Environment,
    pub sources: Sources,
    pub options: RunOptions,
    pub triple_count: TripleCounts,
    pub compat: Option<CompatReport>,
    pub queries: QueryCounts,
    pub status: RunStatus,
    pub aborted: bool,
    pub records: Vec<ExecutionRecord>,
}

pub struct ManifestBuilder {
    sources: Sources,
    options: RunOptions,
    triple_count: TripleCounts,
    compat: Option<CompatReport>,
    discovered: usize,
    aborted: bool,
    records: Vec<ExecutionRecord>,
}

impl ManifestBuilder {
    pub fn new(sources: Sources, options: RunOptions) -> Self {
        Self {
            sources,
            options,
            triple_count: TripleCounts::default(),
            compat: None,
            discovered: 0,
            aborted: false,
            records: Vec::new(),
        }
    }

    pub fn graph(&mut self, triple_count: TripleCounts, compat: CompatReport) {
        self.triple_count = triple_count;
        self.compat = Some(compat);
    }

    pub fn discovered(&mut self, count: usize) {
        self.discovered = count;
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn build(self) -> Manifest {
        let succeeded = self.records.iter().filter(|record| record.ok).count();
        let failed = self.records.len() - succeeded;
        let status = if failed == 0 && !self.aborted {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        };
        Manifest {
            tool: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp_utc: chrono::Utc::now().to_rfc3339(),
            environment: Environment::detect(),
            sources: self.sources,
            options: self.options,
            triple_count: self.triple_count,
            compat: self.compat,
            queries: QueryCounts {
                discovered: self.discovered,
                executed: self.records.len(),
                succeeded,
                failed,
                skipped: self.discovered.saturating_sub(self.records.len()),
            },
            status,
            aborted: self.aborted,
            records: self.records,
        }
    }
}

impl Manifest {
    /// Writes `index.json` and `index.md` at the output root.
    pub fn write(&self, store: &OutputStore) -> Result<(), RunnerError> {
        store.ensure_root()?;
        store.write_json(&store.root().join("index.json"), self)?;
        store.write_bytes_atomic(&store.root().join("index.md"), self.to_markdown(store.root()).as_bytes())
    }

    /// Human-readable summary table, one row per record in execution order.
    pub fn to_markdown(&self, out_root: &Utf8Path) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# SPARQL query pack run\n");
        let _ = writeln!(md, "- timestamp_utc: {}", self.timestamp_utc);
        let _ = writeln!(md, "- graph: `{}`", self.sources.graph);
        let _ = writeln!(
            md,
            "- triple_count: {} (source {})",
            self.triple_count.working, self.triple_count.source
        );
        if let Some(compat) = &self.compat {
            let _ = writeln!(
                md,
                "- compat: {} ({}, +{} triples)",
                compat.mode,
                if compat.applied { "applied" } else { "skipped" },
                compat.added_triples
            );
        }
        let _ = writeln!(md, "- queries: `{}`", self.sources.queries);
        let _ = writeln!(md, "- out: `{}`", self.sources.out);
        let _ = writeln!(md, "- status: {}", self.status);
        if self.aborted {
            let _ = writeln!(
                md,
                "- aborted after first failure, {} queries skipped",
                self.queries.skipped
            );
        }
        if self.options.dry_run {
            let _ = writeln!(md, "- dry run: no artifacts written");
        }
        md.push('\n');
        md.push_str("| query | type | ok | ms | rows | cols | outputs |\n");
        md.push_str("|---|---:|:---:|---:|---:|---:|---|\n");
        for record in &self.records {
            let outputs = record
                .outputs
                .iter()
                .map(|path| {
                    Utf8Path::new(path)
                        .strip_prefix(out_root)
                        .map(|rel| rel.to_string())
                        .unwrap_or_else(|_| path.clone())
                })
                .collect::<Vec<_>>();
            let outputs = if outputs.is_empty() {
                "-".to_string()
            } else {
                outputs.join("<br/>")
            };
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} | {} |",
                record.query_name,
                record.query_type,
                if record.ok { "✅" } else { "❌" },
                record.duration_ms,
                record.rows,
                record.cols,
                outputs
            );
        }
        md
    }
}
