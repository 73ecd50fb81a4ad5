use std::time::{Duration, Instant};

use camino::Utf8Path;

use crate::compat;
use crate::config::ResolvedConfig;
use crate::domain::{QueryKind, RunStatus};
use crate::error::RunnerError;
use crate::executor::{self, QueryOutcome};
use crate::export::Exporter;
use crate::graph::{SourceGraph, WorkingGraph};
use crate::manifest::{ExecutionRecord, Manifest, ManifestBuilder, RunOptions, Sources, TripleCounts};
use crate::prefixes::{enrich, load_prefix_file, merge_catalog};
use crate::query::{DiscoveryOptions, QueryUnit, classify, discover};
use crate::store::OutputStore;
use crate::term::PrefixMap;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sink that drops every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Loading,
    LoadFailed,
    Discovering,
    NoQueries,
    Executing,
    AbortedFailFast,
    Reporting,
    Done,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::LoadFailed | RunPhase::NoQueries | RunPhase::AbortedFailFast | RunPhase::Done
        )
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub manifest: Manifest,
    pub status: RunStatus,
}

/// One invocation over one graph and one query pack.
pub struct Runner {
    config: ResolvedConfig,
    phase: RunPhase,
}

impl Runner {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            config,
            phase: RunPhase::Init,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Loads the graph, runs every discovered query and writes the manifest.
    ///
    /// Precondition failures (graph, prefix file, query discovery) return an
    /// error before any query runs. Query failures are recorded and the run
    /// carries on unless fail-fast is set.
    pub fn run(&mut self, sink: &dyn ProgressSink) -> Result<RunReport, RunnerError> {
        let config = self.config.clone();
        let store = OutputStore::new(config.out.clone(), config.dry_run);
        let mut builder = ManifestBuilder::new(sources(&config), options(&config));

        self.phase = RunPhase::Loading;
        let loaded = load_inputs(&config, sink);
        let (source, catalog) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                self.phase = RunPhase::LoadFailed;
                return Err(err);
            }
        };

        let started = Instant::now();
        let materialization = compat::materialize(source.triples(), config.compat);
        let working = WorkingGraph::build(&source, materialization.augment(source.triples()))?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Compat; mode={} applied={} triples={}",
                config.compat,
                materialization.report.applied,
                working.len()
            ),
            elapsed: Some(started.elapsed()),
        });
        builder.graph(
            TripleCounts {
                source: working.source_len(),
                working: working.len(),
            },
            materialization.report,
        );

        self.phase = RunPhase::Discovering;
        let discovery = DiscoveryOptions {
            recursive: config.recursive,
            extensions: config.query_extensions.clone(),
            only: config.only.clone(),
        };
        let units = match discover(&config.queries, &discovery) {
            Ok(units) => units,
            Err(err) => {
                self.phase = RunPhase::NoQueries;
                return Err(err);
            }
        };
        builder.discovered(units.len());
        sink.event(ProgressEvent {
            message: format!("phase=Discover; {} queries", units.len()),
            elapsed: None,
        });

        self.phase = RunPhase::Executing;
        store.ensure_root()?;
        let exporter = Exporter::new(&store, &config.formats, &catalog);
        for (idx, unit) in units.iter().enumerate() {
            let record = run_query(unit, &working, &catalog, &store, &exporter);
            sink.event(ProgressEvent {
                message: format!(
                    "query {}/{} {} {}",
                    idx + 1,
                    units.len(),
                    record.query_name,
                    if record.ok { "ok" } else { "failed" }
                ),
                elapsed: Some(Duration::from_millis(record.duration_ms)),
            });
            let failed = !record.ok;
            builder.push(record);
            if failed && config.fail_fast {
                tracing::warn!(
                    query = %unit.name,
                    skipped = units.len() - idx - 1,
                    "fail-fast: stopping after first failure"
                );
                builder.abort();
                self.phase = RunPhase::AbortedFailFast;
                break;
            }
        }

        if self.phase == RunPhase::Executing {
            self.phase = RunPhase::Reporting;
        }
        let manifest = builder.build();
        manifest.write(&store)?;
        sink.event(ProgressEvent {
            message: format!("phase=Report; status={}", manifest.status),
            elapsed: None,
        });
        if self.phase == RunPhase::Reporting {
            self.phase = RunPhase::Done;
        }

        let status = manifest.status;
        Ok(RunReport { manifest, status })
    }
}

fn load_inputs(
    config: &ResolvedConfig,
    sink: &dyn ProgressSink,
) -> Result<(SourceGraph, PrefixMap), RunnerError> {
    let started = Instant::now();
    let source = SourceGraph::load(&config.graph)?;
    tracing::info!(graph = %config.graph, triples = source.len(), "graph loaded");
    sink.event(ProgressEvent {
        message: format!("phase=Load; {} triples", source.len()),
        elapsed: Some(started.elapsed()),
    });

    let external = config
        .prefixes
        .as_deref()
        .map(load_prefix_file)
        .transpose()?;
    let catalog = merge_catalog(source.prefixes(), external.as_ref(), config.prefix_precedence);
    Ok((source, catalog))
}

fn run_query(
    unit: &QueryUnit,
    working: &WorkingGraph,
    catalog: &PrefixMap,
    store: &OutputStore,
    exporter: &Exporter<'_>,
) -> ExecutionRecord {
    let mut record = ExecutionRecord {
        query_file: unit.path.to_string(),
        query_name: unit.name.clone(),
        query_type: QueryKind::Unknown,
        ok: false,
        duration_ms: 0,
        rows: 0,
        cols: 0,
        outputs: Vec::new(),
        artifacts_written: false,
        error: None,
    };

    let dir = store.query_dir(&unit.name);
    let source = match unit.load() {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(query = %unit.name, error = %err, "query not run");
            record.error = Some(err.to_string());
            clear_stale(store, &dir, &unit.name);
            return record;
        }
    };

    let text = enrich(&source.text, &source.declared, catalog);
    let kind = classify(&text);
    tracing::debug!(
        query = %unit.name,
        kind = %kind,
        declared = source.declared.len(),
        injected = catalog.keys().filter(|name| !source.declared.contains_key(*name)).count(),
        "query prepared"
    );
    let execution = executor::execute(working, kind, &text);
    record.query_type = execution.kind;
    record.duration_ms = execution.duration.as_millis() as u64;

    match execution.outcome {
        Ok(outcome) => {
            let (rows, cols) = outcome.dimensions();
            record.rows = rows;
            record.cols = cols;
            let exported = store
                .reset_dir(&dir)
                .and_then(|()| exporter.export(&dir, unit.file_name(), kind, &outcome));
            match exported {
                Ok(paths) => {
                    record.ok = true;
                    record.artifacts_written = !store.is_dry_run() && !paths.is_empty();
                    record.outputs = paths.iter().map(|path| path.to_string()).collect();
                    log_success(&unit.name, kind, &outcome, record.duration_ms);
                }
                Err(err) => {
                    tracing::warn!(query = %unit.name, error = %err, "export failed");
                    record.error = Some(err.to_string());
                }
            }
        }
        Err(message) => {
            tracing::warn!(query = %unit.name, kind = %kind, error = %message, "query failed");
            record.error = Some(message);
            clear_stale(store, &dir, &unit.name);
        }
    }
    record
}

/// A failed query leaves an empty output directory behind, never artifacts
/// from an earlier run.
fn clear_stale(store: &OutputStore, dir: &Utf8Path, name: &str) {
    if let Err(err) = store.reset_dir(dir) {
        tracing::warn!(query = %name, error = %err, "stale output not cleared");
    }
}

fn log_success(name: &str, kind: QueryKind, outcome: &QueryOutcome, duration_ms: u64) {
    match outcome {
        QueryOutcome::Boolean(value) => {
            tracing::info!(query = %name, kind = %kind, answer = value, duration_ms, "query ok");
        }
        _ => {
            let (rows, cols) = outcome.dimensions();
            tracing::info!(query = %name, kind = %kind, rows, cols, duration_ms, "query ok");
        }
    }
}

fn sources(config: &ResolvedConfig) -> Sources {
    Sources {
        graph: config.graph.to_string(),
        queries: config.queries.to_string(),
        out: config.out.to_string(),
        prefixes: config.prefixes.as_ref().map(|path| path.to_string()),
    }
}

fn options(config: &ResolvedConfig) -> RunOptions {
    RunOptions {
        compat: config.compat,
        formats: config.formats.clone(),
        recursive: config.recursive,
        fail_fast: config.fail_fast,
        dry_run: config.dry_run,
        prefix_precedence: config.prefix_precedence,
        only: config.only.clone(),
    }
}
