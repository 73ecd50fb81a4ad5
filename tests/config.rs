use std::fs;

use assert_matches::assert_matches;

use kira_sparql_runner::config::{Config, ConfigLoader, Overrides, default_formats};
use kira_sparql_runner::domain::{CompatMode, ExportFormat, PrefixPrecedence};
use kira_sparql_runner::error::RunnerError;

#[test]
fn parse_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-sr.json");
    fs::write(
        &path,
        r#"{
            "graph": "data/rdf/custom.ttl",
            "formats": ["json"],
            "compat": "on",
            "prefix_precedence": "external",
            "query_extensions": [".RQ", "sparql"],
            "fail_fast": true
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(Some(path.to_str().unwrap()), Overrides::default()).unwrap();
    assert_eq!(resolved.graph.as_str(), "data/rdf/custom.ttl");
    assert_eq!(resolved.queries.as_str(), "queries/sparql");
    assert_eq!(resolved.formats, vec![ExportFormat::Json]);
    assert_eq!(resolved.compat, CompatMode::On);
    assert_eq!(resolved.prefix_precedence, PrefixPrecedence::External);
    assert_eq!(resolved.query_extensions, vec!["rq", "sparql"]);
    assert!(resolved.fail_fast);
    assert!(!resolved.recursive);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/kira-sr.json"), Overrides::default())
        .unwrap_err();
    assert_matches!(err, RunnerError::ConfigRead(_));
    assert!(err.is_configuration());
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-sr.json");
    fs::write(&path, r#"{"compat": "sometimes"}"#).unwrap();
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap()), Overrides::default())
        .unwrap_err();
    assert_matches!(err, RunnerError::ConfigParse(_));
}

#[test]
fn formats_are_deduplicated() {
    let overrides = Overrides {
        formats: vec![ExportFormat::Json, ExportFormat::Csv, ExportFormat::Json],
        ..Overrides::default()
    };
    let resolved = ConfigLoader::resolve_config(Config::default(), overrides).unwrap();
    assert_eq!(resolved.formats, default_formats());
}

#[test]
fn cli_flags_switch_on_file_settings() {
    let config = Config {
        recursive: Some(false),
        dry_run: Some(true),
        only: Some(vec!["q01".to_string()]),
        ..Config::default()
    };
    let overrides = Overrides {
        recursive: true,
        only: vec!["q02".to_string()],
        ..Overrides::default()
    };
    let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
    assert!(resolved.recursive);
    assert!(resolved.dry_run);
    assert_eq!(resolved.only, vec!["q02"]);
}

#[test]
fn unsupported_schema_version() {
    let config = Config {
        schema_version: Some(7),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config, Overrides::default()).unwrap_err();
    assert_matches!(err, RunnerError::InvalidOption(_));
}
