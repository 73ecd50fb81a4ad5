use std::fs;

use camino::Utf8PathBuf;

use kira_sparql_runner::domain::{QueryKind, RunStatus, slugify};
use kira_sparql_runner::query::{DiscoveryOptions, discover};

#[test]
fn query_kind_serializes_uppercase() {
    assert_eq!(serde_json::to_string(&QueryKind::Describe).unwrap(), "\"DESCRIBE\"");
    assert_eq!(QueryKind::Unknown.to_string(), "UNKNOWN");
    assert!(QueryKind::Construct.is_graph());
    assert!(!QueryKind::Select.is_graph());
}

#[test]
fn run_status_serializes_kebab_case() {
    assert_eq!(
        serde_json::to_string(&RunStatus::PartialFailure).unwrap(),
        "\"partial-failure\""
    );
}

#[test]
fn slug_is_filesystem_safe() {
    assert_eq!(slugify("Q03: Cases per Project"), "q03_cases_per_project");
    assert_eq!(slugify("nested/q04"), "nested_q04");
}

#[test]
fn recursive_discovery_disambiguates_slugs() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    fs::create_dir_all(root.join("genes")).unwrap();
    fs::write(root.join("Q1.rq"), "ASK {}").unwrap();
    fs::write(root.join("q1.rq"), "ASK {}").unwrap();
    fs::write(root.join("genes").join("q1.rq"), "ASK {}").unwrap();

    let flat = discover(&root, &DiscoveryOptions::default()).unwrap();
    let names = flat.iter().map(|unit| unit.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["q1", "q1_2"]);

    let options = DiscoveryOptions {
        recursive: true,
        ..DiscoveryOptions::default()
    };
    let nested = discover(&root, &options).unwrap();
    let names = nested.iter().map(|unit| unit.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["q1", "genes_q1", "q1_2"]);
    assert!(nested[1].path.ends_with("genes/q1.rq"));
}
