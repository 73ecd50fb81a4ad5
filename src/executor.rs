use std::time::{Duration, Instant};

use oxigraph::model::Graph;
use oxigraph::sparql::QueryResults;

use crate::domain::QueryKind;
use crate::graph::WorkingGraph;
use crate::term::{PrefixMap, render_term};

/// Solution table with every value already rendered to its display string.
/// Unbound cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Table(Table),
    Boolean(bool),
    Graph(Graph),
}

impl QueryOutcome {
    fn shape(&self) -> &'static str {
        match self {
            QueryOutcome::Table(_) => "solutions",
            QueryOutcome::Boolean(_) => "boolean",
            QueryOutcome::Graph(_) => "graph",
        }
    }

    /// Row and column counts reported in the execution record. Graph results
    /// count triples as rows with three columns.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            QueryOutcome::Table(table) => (table.rows.len(), table.columns.len()),
            QueryOutcome::Boolean(_) => (0, 0),
            QueryOutcome::Graph(graph) => (graph.len(), 3),
        }
    }
}

#[derive(Debug)]
pub struct Execution {
    pub kind: QueryKind,
    pub outcome: Result<QueryOutcome, String>,
    pub duration: Duration,
}

/// Runs one enriched query against the working graph. Failures are captured
/// with the engine's message and never escape as errors.
pub fn execute(graph: &WorkingGraph, kind: QueryKind, sparql: &str) -> Execution {
    let started = Instant::now();
    let outcome = graph
        .query(sparql)
        .and_then(|results| collect(results, graph.prefixes()))
        .and_then(|outcome| check_shape(kind, outcome));
    Execution {
        kind,
        outcome,
        duration: started.elapsed(),
    }
}

fn collect(results: QueryResults, prefixes: &PrefixMap) -> Result<QueryOutcome, String> {
    match results {
        QueryResults::Boolean(value) => Ok(QueryOutcome::Boolean(value)),
        QueryResults::Solutions(solutions) => {
            let columns = solutions
                .variables()
                .iter()
                .map(|var| var.as_str().to_string())
                .collect::<Vec<_>>();
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|err| err.to_string())?;
                let row = (0..columns.len())
                    .map(|idx| render_term(solution.get(idx).map(|term| term.as_ref()), prefixes))
                    .collect();
                rows.push(row);
            }
            Ok(QueryOutcome::Table(Table { columns, rows }))
        }
        QueryResults::Graph(triples) => {
            let mut graph = Graph::new();
            for triple in triples {
                let triple = triple.map_err(|err| err.to_string())?;
                graph.insert(&triple);
            }
            Ok(QueryOutcome::Graph(graph))
        }
    }
}

fn check_shape(kind: QueryKind, outcome: QueryOutcome) -> Result<QueryOutcome, String> {
    let expected = match kind {
        QueryKind::Select | QueryKind::Unknown => "solutions",
        QueryKind::Ask => "boolean",
        QueryKind::Construct | QueryKind::Describe => "graph",
    };
    if outcome.shape() == expected {
        Ok(outcome)
    } else if kind == QueryKind::Unknown {
        Err(format!(
            "query type could not be determined and the engine returned a {} result, which has no tabular export",
            outcome.shape()
        ))
    } else {
        Err(format!(
            "query classified as {kind} but the engine returned a {} result",
            outcome.shape()
        ))
    }
}
