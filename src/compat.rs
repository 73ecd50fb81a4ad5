//! In-memory compatibility layer for the biointegrate query pack.
//!
//! The pack expects `bi:Project`/`bi:Case` resources with identifier literals,
//! `bi:hasCase` and `bi:hasCaseMeasurement` edges and `bi:BioEntity` typing.
//! Graphs exported from the document store only carry expression
//! measurements, so those shapes are derived here from the measurements
//! themselves. Derivation reads the source triples only and returns the new
//! triples separately; nothing is ever written back to the graph source.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::Instant;

use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, Literal, NamedNode, NamedNodeRef, SubjectRef, TermRef, Triple};
use regex::Regex;
use serde::Serialize;

use crate::domain::CompatMode;

pub const BI_NAMESPACE: &str = "http://example.org/biointegrate/";

/// `{gene}_{projectId}_{caseId}` as the last path segment of a measurement IRI.
static COMPOUND_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<gene>.+)_(?P<project>[^_]+)_(?P<case>[^_]+)$").expect("valid regex")
});

struct Vocab {
    project: NamedNode,
    case: NamedNode,
    bio_entity: NamedNode,
    expression_measurement: NamedNode,
    gene: NamedNode,
    protein: NamedNode,
    project_id: NamedNode,
    case_id: NamedNode,
    has_case: NamedNode,
    case_in_project: NamedNode,
    has_case_measurement: NamedNode,
    measured_case: NamedNode,
}

impl Vocab {
    fn new() -> Self {
        let bi = |local: &str| NamedNode::new_unchecked(format!("{BI_NAMESPACE}{local}"));
        Self {
            project: bi("Project"),
            case: bi("Case"),
            bio_entity: bi("BioEntity"),
            expression_measurement: bi("ExpressionMeasurement"),
            gene: bi("Gene"),
            protein: bi("Protein"),
            project_id: bi("projectId"),
            case_id: bi("caseId"),
            has_case: bi("hasCase"),
            case_in_project: bi("caseInProject"),
            has_case_measurement: bi("hasCaseMeasurement"),
            measured_case: bi("measuredCase"),
        }
    }
}

/// Which of the expected patterns the source graph already exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternProbe {
    pub projects: bool,
    pub cases: bool,
    pub has_case: bool,
    pub has_case_measurement: bool,
    pub bio_entity: bool,
    pub measurements: bool,
}

impl PatternProbe {
    pub fn complete(&self) -> bool {
        self.projects && self.cases && self.has_case && self.has_case_measurement && self.bio_entity
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompatReport {
    pub mode: String,
    pub applied: bool,
    pub reason: String,
    pub probe: PatternProbe,
    pub measurements_scanned: usize,
    pub created_projects: usize,
    pub created_cases: usize,
    pub added_has_case: usize,
    pub added_case_in_project: usize,
    pub added_has_case_measurement: usize,
    pub added_bioentity_typed: usize,
    pub conflicts: usize,
    pub added_triples: usize,
    pub duration_ms: u64,
}

/// Derived triples plus an account of how they were produced.
#[derive(Debug, Clone)]
pub struct Materialization {
    pub derived: Graph,
    pub report: CompatReport,
}

impl Materialization {
    fn skipped(mode: CompatMode, probe: PatternProbe, reason: &str) -> Self {
        Self {
            derived: Graph::new(),
            report: CompatReport {
                mode: mode.to_string(),
                applied: false,
                reason: reason.to_string(),
                probe,
                ..CompatReport::default()
            },
        }
    }

    /// Returns `base` plus the derived triples; `base` itself is untouched.
    pub fn augment(&self, base: &Graph) -> Graph {
        let mut working = base.clone();
        for triple in self.derived.iter() {
            working.insert(triple);
        }
        working
    }
}

pub fn probe(source: &Graph) -> PatternProbe {
    let vocab = Vocab::new();
    let typed = |class: &NamedNode| {
        source
            .subjects_for_predicate_object(rdf::TYPE, class.as_ref())
            .next()
            .is_some()
    };
    let used = |predicate: &NamedNode| {
        source
            .triples_for_predicate(predicate.as_ref())
            .next()
            .is_some()
    };

    PatternProbe {
        projects: typed(&vocab.project) || used(&vocab.project_id),
        cases: typed(&vocab.case) || used(&vocab.case_id),
        has_case: used(&vocab.has_case),
        has_case_measurement: used(&vocab.has_case_measurement),
        bio_entity: typed(&vocab.bio_entity),
        measurements: typed(&vocab.expression_measurement) || used(&vocab.measured_case),
    }
}

pub fn materialize(source: &Graph, mode: CompatMode) -> Materialization {
    let probe = probe(source);
    match mode {
        CompatMode::Off => return Materialization::skipped(mode, probe, "disabled"),
        CompatMode::Auto if probe.complete() => {
            return Materialization::skipped(mode, probe, "expected patterns already present");
        }
        _ => {}
    }
    if !probe.measurements {
        return Materialization::skipped(mode, probe, "no expression measurements to derive from");
    }

    let started = Instant::now();
    let mut deriver = Deriver::new(source);
    deriver.run();
    let Deriver {
        derived,
        mut report,
        ..
    } = deriver;

    report.mode = mode.to_string();
    report.applied = true;
    report.reason = match mode {
        CompatMode::On => "forced".to_string(),
        _ => "expected patterns missing".to_string(),
    };
    report.probe = probe;
    report.added_triples = derived.iter().filter(|triple| !source.contains(*triple)).count();
    report.duration_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        measurements = report.measurements_scanned,
        projects = report.created_projects,
        cases = report.created_cases,
        added_triples = report.added_triples,
        "compatibility triples derived"
    );
    Materialization { derived, report }
}

struct Deriver<'a> {
    source: &'a Graph,
    vocab: Vocab,
    derived: Graph,
    report: CompatReport,
    projects: BTreeSet<NamedNode>,
    cases: BTreeSet<NamedNode>,
    case_project: BTreeMap<NamedNode, NamedNode>,
    bio_entities: BTreeSet<String>,
}

impl<'a> Deriver<'a> {
    fn new(source: &'a Graph) -> Self {
        Self {
            source,
            vocab: Vocab::new(),
            derived: Graph::new(),
            report: CompatReport::default(),
            projects: BTreeSet::new(),
            cases: BTreeSet::new(),
            case_project: BTreeMap::new(),
            bio_entities: BTreeSet::new(),
        }
    }

    fn run(&mut self) {
        for measurement in self.measurements() {
            self.report.measurements_scanned += 1;
            if self.report.measurements_scanned % 50_000 == 0 {
                tracing::debug!(measurements = self.report.measurements_scanned, "compat progress");
            }
            self.derive_measurement(&measurement);
        }

        for class in [self.vocab.gene.clone(), self.vocab.protein.clone()] {
            let entities = self
                .source
                .subjects_for_predicate_object(rdf::TYPE, class.as_ref())
                .map(|subject| subject.into_owned())
                .collect::<Vec<_>>();
            for entity in entities {
                let key = entity.to_string();
                self.add(Triple::new(entity, rdf::TYPE, self.vocab.bio_entity.clone()));
                if self.bio_entities.insert(key) {
                    self.report.added_bioentity_typed += 1;
                }
            }
        }
    }

    /// Named measurement resources, in IRI order.
    fn measurements(&self) -> BTreeSet<NamedNode> {
        let typed = self
            .source
            .subjects_for_predicate_object(rdf::TYPE, self.vocab.expression_measurement.as_ref());
        let linked = self
            .source
            .triples_for_predicate(self.vocab.measured_case.as_ref())
            .map(|triple| triple.subject);
        typed
            .chain(linked)
            .filter_map(|subject| match subject {
                SubjectRef::NamedNode(node) => Some(node.into_owned()),
                _ => None,
            })
            .collect()
    }

    fn derive_measurement(&mut self, measurement: &NamedNode) {
        self.type_bio_entity(measurement.as_ref());

        let compound = last_segment(measurement.as_str())
            .and_then(|tail| COMPOUND_ID.captures(tail))
            .map(|caps| (caps["project"].to_string(), caps["case"].to_string()));

        let linked_case = match self
            .source
            .object_for_subject_predicate(measurement.as_ref(), self.vocab.measured_case.as_ref())
        {
            Some(TermRef::NamedNode(node)) => Some(node.into_owned()),
            _ => None,
        };
        let case = match (linked_case, &compound) {
            (Some(case), _) => case,
            (None, Some((_, case_id))) => {
                NamedNode::new_unchecked(format!("{BI_NAMESPACE}case/{case_id}"))
            }
            (None, None) => return,
        };
        self.ensure_case(&case);

        if let Some((project_id, _)) = compound {
            let project = self.ensure_project(&project_id);
            match self.case_project.get(&case) {
                None => {
                    self.case_project.insert(case.clone(), project.clone());
                    self.add(Triple::new(
                        project.clone(),
                        self.vocab.has_case.clone(),
                        case.clone(),
                    ));
                    self.add(Triple::new(
                        case.clone(),
                        self.vocab.case_in_project.clone(),
                        project,
                    ));
                    self.report.added_has_case += 1;
                    self.report.added_case_in_project += 1;
                }
                Some(previous) if *previous != project => {
                    self.report.conflicts += 1;
                    tracing::warn!(
                        case = %case,
                        kept = %previous,
                        ignored = %project,
                        "case linked to more than one project"
                    );
                }
                Some(_) => {}
            }
        }

        self.add(Triple::new(
            case,
            self.vocab.has_case_measurement.clone(),
            measurement.clone(),
        ));
        self.report.added_has_case_measurement += 1;
    }

    fn ensure_case(&mut self, case: &NamedNode) {
        if !self.cases.insert(case.clone()) {
            return;
        }
        let case_id = last_segment(case.as_str()).unwrap_or(case.as_str()).to_string();
        self.add(Triple::new(case.clone(), rdf::TYPE, self.vocab.case.clone()));
        self.add(Triple::new(
            case.clone(),
            self.vocab.case_id.clone(),
            Literal::new_simple_literal(case_id),
        ));
        self.type_bio_entity(case.as_ref());
        self.report.created_cases += 1;
    }

    fn ensure_project(&mut self, project_id: &str) -> NamedNode {
        let project = NamedNode::new_unchecked(format!("{BI_NAMESPACE}project/{project_id}"));
        if self.projects.insert(project.clone()) {
            self.add(Triple::new(project.clone(), rdf::TYPE, self.vocab.project.clone()));
            self.add(Triple::new(
                project.clone(),
                self.vocab.project_id.clone(),
                Literal::new_simple_literal(project_id),
            ));
            self.type_bio_entity(project.as_ref());
            self.report.created_projects += 1;
        }
        project
    }

    fn type_bio_entity(&mut self, node: NamedNodeRef<'_>) {
        self.add(Triple::new(node.into_owned(), rdf::TYPE, self.vocab.bio_entity.clone()));
        if self.bio_entities.insert(node.as_str().to_string()) {
            self.report.added_bioentity_typed += 1;
        }
    }

    fn add(&mut self, triple: Triple) {
        self.derived.insert(&triple);
    }
}

fn last_segment(iri: &str) -> Option<&str> {
    iri.rsplit(['/', '#']).next().filter(|tail| !tail.is_empty())
}
