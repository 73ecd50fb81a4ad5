use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, Literal, NamedNode, Triple};

use kira_sparql_runner::compat::{BI_NAMESPACE, materialize, probe};
use kira_sparql_runner::domain::CompatMode;

fn bi(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{BI_NAMESPACE}{local}"))
}

/// 25 measurements with four triples each: 100 triples, no project or case
/// resources.
fn measurement_graph() -> Graph {
    let mut graph = Graph::new();
    let genes = ["TP53", "EGFR", "IDH1", "PTEN", "ATRX"];
    for idx in 0..25 {
        let gene = genes[idx % genes.len()];
        let project = if idx % 2 == 0 { "TCGA-GBM" } else { "TCGA-LGG" };
        let measurement = bi(&format!("expression/{gene}_{project}_case{idx:02}"));
        graph.insert(&Triple::new(measurement.clone(), rdf::TYPE, bi("ExpressionMeasurement")));
        graph.insert(&Triple::new(measurement.clone(), bi("ofGene"), bi(&format!("gene/{gene}"))));
        graph.insert(&Triple::new(
            measurement.clone(),
            bi("value"),
            Literal::new_simple_literal(format!("{}.5", idx)),
        ));
        graph.insert(&Triple::new(
            measurement,
            bi("unit"),
            Literal::new_simple_literal("fpkm"),
        ));
    }
    graph
}

#[test]
fn auto_mode_materializes_missing_patterns_once() {
    let source = measurement_graph();
    assert_eq!(source.len(), 100);
    assert!(!probe(&source).complete());

    let first = materialize(&source, CompatMode::Auto);
    assert!(first.report.applied);
    let working = first.augment(&source);
    assert!(working.len() > 100);
    assert_eq!(source.len(), 100);
    assert_eq!(working.len(), 100 + first.report.added_triples);
    assert_eq!(first.report.created_projects, 2);
    assert_eq!(first.report.created_cases, 25);
    assert_eq!(first.report.added_has_case_measurement, 25);

    let forced = materialize(&working, CompatMode::On);
    assert!(forced.report.applied);
    assert_eq!(forced.augment(&working).len(), working.len());
    assert_eq!(forced.report.added_triples, 0);

    let again = materialize(&working, CompatMode::Auto);
    assert!(!again.report.applied);
    assert!(probe(&working).complete());
}

#[test]
fn derived_shapes_match_the_query_pack() {
    let source = measurement_graph();
    let working = materialize(&source, CompatMode::On).augment(&source);

    let project = bi("project/TCGA-GBM");
    let case = bi("case/case00");
    let measurement = bi("expression/TP53_TCGA-GBM_case00");

    assert!(working.contains(&Triple::new(project.clone(), rdf::TYPE, bi("Project"))));
    assert!(working.contains(&Triple::new(
        project.clone(),
        bi("projectId"),
        Literal::new_simple_literal("TCGA-GBM")
    )));
    assert!(working.contains(&Triple::new(case.clone(), rdf::TYPE, bi("Case"))));
    assert!(working.contains(&Triple::new(
        case.clone(),
        bi("caseId"),
        Literal::new_simple_literal("case00")
    )));
    assert!(working.contains(&Triple::new(project.clone(), bi("hasCase"), case.clone())));
    assert!(working.contains(&Triple::new(case.clone(), bi("caseInProject"), project)));
    assert!(working.contains(&Triple::new(case, bi("hasCaseMeasurement"), measurement.clone())));
    assert!(working.contains(&Triple::new(measurement, rdf::TYPE, bi("BioEntity"))));
}

#[test]
fn measured_case_link_takes_priority() {
    let mut source = Graph::new();
    let measurement = bi("expression/TP53_TCGA-GBM_c1");
    let case = bi("case/TCGA-06-0125");
    source.insert(&Triple::new(measurement.clone(), bi("measuredCase"), case.clone()));

    let working = materialize(&source, CompatMode::Auto).augment(&source);
    assert!(working.contains(&Triple::new(case.clone(), bi("hasCaseMeasurement"), measurement)));
    assert!(working.contains(&Triple::new(
        case.clone(),
        bi("caseId"),
        Literal::new_simple_literal("TCGA-06-0125")
    )));
    assert!(working.contains(&Triple::new(bi("project/TCGA-GBM"), bi("hasCase"), case)));
    assert!(!working.contains(&Triple::new(bi("case/c1"), rdf::TYPE, bi("Case"))));
}

#[test]
fn conflicting_projects_keep_the_first() {
    let mut source = Graph::new();
    for id in ["EGFR_TCGA-LGG_c9", "TP53_TCGA-GBM_c9"] {
        source.insert(&Triple::new(
            bi(&format!("expression/{id}")),
            rdf::TYPE,
            bi("ExpressionMeasurement"),
        ));
    }

    let result = materialize(&source, CompatMode::On);
    assert_eq!(result.report.conflicts, 1);
    let working = result.augment(&source);
    let case = bi("case/c9");
    assert!(working.contains(&Triple::new(case.clone(), bi("caseInProject"), bi("project/TCGA-LGG"))));
    assert!(!working.contains(&Triple::new(case, bi("caseInProject"), bi("project/TCGA-GBM"))));
}

#[test]
fn genes_and_proteins_become_bio_entities() {
    let mut source = measurement_graph();
    source.insert(&Triple::new(bi("TP53"), rdf::TYPE, bi("Gene")));
    source.insert(&Triple::new(bi("P04637"), rdf::TYPE, bi("Protein")));

    let working = materialize(&source, CompatMode::Auto).augment(&source);
    assert!(working.contains(&Triple::new(bi("TP53"), rdf::TYPE, bi("BioEntity"))));
    assert!(working.contains(&Triple::new(bi("P04637"), rdf::TYPE, bi("BioEntity"))));
}

#[test]
fn graph_without_measurements_is_left_alone() {
    let mut source = Graph::new();
    source.insert(&Triple::new(bi("TP53"), rdf::TYPE, bi("Gene")));

    let result = materialize(&source, CompatMode::On);
    assert!(!result.report.applied);
    assert_eq!(result.derived.len(), 0);
}
