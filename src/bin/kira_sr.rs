use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_sparql_runner::app::Runner;
use kira_sparql_runner::config::{ConfigLoader, Overrides};
use kira_sparql_runner::domain::{CompatMode, ExportFormat, PrefixPrecedence, RunStatus};
use kira_sparql_runner::error::RunnerError;
use kira_sparql_runner::output::{self, JsonOutput, LogProgress};

#[derive(Parser)]
#[command(name = "kira-sr")]
#[command(about = "Run a pack of SPARQL queries against an RDF graph and export the results")]
#[command(version, author)]
struct Cli {
    /// RDF graph source (Turtle by default, format guessed from the extension)
    #[arg(long)]
    graph: Option<String>,

    /// Directory holding the query files
    #[arg(long)]
    queries: Option<String>,

    /// Output directory
    #[arg(long)]
    out: Option<String>,

    /// Extra PREFIX declarations to inject into queries
    #[arg(long)]
    prefixes: Option<String>,

    /// Run config file (default: kira-sr.json when present)
    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_enum)]
    compat: Option<CompatMode>,

    /// Which prefix catalog wins on conflicting bindings
    #[arg(long, value_enum)]
    prefix_precedence: Option<PrefixPrecedence>,

    #[arg(long)]
    recursive: bool,

    /// Tabular export format, repeatable
    #[arg(long = "format", value_enum)]
    formats: Vec<ExportFormat>,

    /// Run only the named queries (file stem or file name), repeatable
    #[arg(long)]
    only: Vec<String>,

    #[arg(long)]
    fail_fast: bool,

    /// Execute and time queries without writing anything
    #[arg(long)]
    dry_run: bool,

    #[arg(long, short)]
    verbose: bool,

    /// Print the manifest as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<RunnerError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &RunnerError) -> u8 {
    if error.is_configuration() {
        RunStatus::ConfigurationError.exit_code()
    } else {
        RunStatus::PartialFailure.exit_code()
    }
}

fn run() -> miette::Result<RunStatus> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        graph: cli.graph,
        queries: cli.queries,
        out: cli.out,
        prefixes: cli.prefixes,
        formats: cli.formats,
        recursive: cli.recursive,
        fail_fast: cli.fail_fast,
        dry_run: cli.dry_run,
        compat: cli.compat,
        prefix_precedence: cli.prefix_precedence,
        only: cli.only,
    };
    let resolved = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let mut runner = Runner::new(resolved);
    let report = runner.run(&LogProgress)?;

    if cli.json {
        JsonOutput::print_manifest(&report.manifest).into_diagnostic()?;
    } else {
        output::print_summary(&report.manifest);
    }
    Ok(report.status)
}
