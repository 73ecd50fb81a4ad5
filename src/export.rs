use camino::{Utf8Path, Utf8PathBuf};
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{Graph, NamedNode};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::domain::{ExportFormat, QueryKind};
use crate::error::RunnerError;
use crate::executor::{QueryOutcome, Table};
use crate::store::OutputStore;
use crate::term::PrefixMap;

/// Writes the artifacts of one successful execution.
pub struct Exporter<'a> {
    store: &'a OutputStore,
    formats: &'a [ExportFormat],
    prefixes: &'a PrefixMap,
}

impl<'a> Exporter<'a> {
    pub fn new(store: &'a OutputStore, formats: &'a [ExportFormat], prefixes: &'a PrefixMap) -> Self {
        Self {
            store,
            formats,
            prefixes,
        }
    }

    /// Returns the artifact paths in the order they were produced. In a dry
    /// run the paths are the ones that would have been written.
    pub fn export(
        &self,
        dir: &Utf8Path,
        query_file: &str,
        kind: QueryKind,
        outcome: &QueryOutcome,
    ) -> Result<Vec<Utf8PathBuf>, RunnerError> {
        let mut outputs = Vec::new();
        match outcome {
            QueryOutcome::Table(table) => {
                if self.wants(ExportFormat::Json) {
                    let path = dir.join("result.json");
                    self.store.write_json(&path, &TabularDocument::new(table))?;
                    outputs.push(path);
                }
                if self.wants(ExportFormat::Csv) {
                    let path = dir.join("result.csv");
                    self.store.write_bytes_atomic(&path, &table_csv(table)?)?;
                    outputs.push(path);
                }
            }
            QueryOutcome::Boolean(value) => {
                let path = dir.join("result.json");
                self.store.write_json(
                    &path,
                    &BooleanDocument {
                        kind,
                        query: query_file,
                        boolean: *value,
                    },
                )?;
                outputs.push(path);
            }
            QueryOutcome::Graph(graph) => {
                let path = dir.join("result.ttl");
                self.store.write_bytes_atomic(&path, &graph_turtle(graph, self.prefixes)?)?;
                outputs.push(path);
                if self.wants(ExportFormat::Json) {
                    let path = dir.join("summary.json");
                    self.store.write_json(
                        &path,
                        &GraphSummary {
                            kind,
                            triples: graph.len(),
                        },
                    )?;
                    outputs.push(path);
                }
            }
        }
        Ok(outputs)
    }

    fn wants(&self, format: ExportFormat) -> bool {
        self.formats.contains(&format)
    }
}

#[derive(Serialize)]
struct BooleanDocument<'a> {
    #[serde(rename = "type")]
    kind: QueryKind,
    query: &'a str,
    boolean: bool,
}

#[derive(Serialize)]
struct GraphSummary {
    #[serde(rename = "type")]
    kind: QueryKind,
    triples: usize,
}

/// `{"columns": [...], "rows": [{column: value}]}` with each row's keys in
/// column order.
#[derive(Serialize)]
struct TabularDocument<'a> {
    columns: &'a [String],
    rows: Vec<RowObject<'a>>,
}

impl<'a> TabularDocument<'a> {
    fn new(table: &'a Table) -> Self {
        let rows = table
            .rows
            .iter()
            .map(|values| RowObject {
                columns: &table.columns,
                values,
            })
            .collect();
        Self {
            columns: &table.columns,
            rows,
        }
    }
}

struct RowObject<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl Serialize for RowObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A table without columns still yields one record per row; the csv writer
/// renders an empty record as a single empty quoted field.
fn table_csv(table: &Table) -> Result<Vec<u8>, RunnerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.columns)
        .map_err(|err| RunnerError::Filesystem(err.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|err| RunnerError::Filesystem(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| RunnerError::Filesystem(err.to_string()))
}

/// Turtle rendering with the run's prefix bindings. Triples are sorted so
/// identical graphs always serialize identically.
fn graph_turtle(graph: &Graph, prefixes: &PrefixMap) -> Result<Vec<u8>, RunnerError> {
    let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle);
    for (name, iri) in prefixes {
        if NamedNode::new(iri.as_str()).is_err() {
            continue;
        }
        serializer = serializer
            .with_prefix(name.as_str(), iri.as_str())
            .map_err(|err| RunnerError::Filesystem(format!("prefix {name}: {err}")))?;
    }

    let mut triples = graph.iter().collect::<Vec<_>>();
    triples.sort_by_cached_key(|triple| triple.to_string());

    let mut writer = serializer.for_writer(Vec::new());
    for triple in triples {
        writer
            .serialize_triple(triple)
            .map_err(|err| RunnerError::Filesystem(err.to_string()))?;
    }
    writer
        .finish()
        .map_err(|err| RunnerError::Filesystem(err.to_string()))
}

#[cfg(test)]
mod tests {
    use oxigraph::model::{Literal, Triple};

    use super::*;

    fn table() -> Table {
        Table {
            columns: vec!["project".to_string(), "cases".to_string(), "note".to_string()],
            rows: vec![
                vec!["bi:project_TCGA-GBM".to_string(), "2".to_string(), String::new()],
                vec!["bi:project_TCGA-LUAD".to_string(), "1".to_string(), "a, \"quoted\" note".to_string()],
            ],
        }
    }

    #[test]
    fn tabular_json_keeps_column_order() {
        let table = table();
        let json = serde_json::to_string(&TabularDocument::new(&table)).unwrap();
        assert!(json.starts_with(r#"{"columns":["project","cases","note"],"rows":[{"project":"#));
        assert!(json.contains(r#""cases":"2","note":"""#));
    }

    #[test]
    fn csv_quotes_and_keeps_empty_cells() {
        let csv = String::from_utf8(table_csv(&table()).unwrap()).unwrap();
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "project,cases,note");
        assert_eq!(lines[1], "bi:project_TCGA-GBM,2,");
        assert_eq!(lines[2], "bi:project_TCGA-LUAD,1,\"a, \"\"quoted\"\" note\"");
    }

    #[test]
    fn csv_without_columns_keeps_row_count() {
        let empty = String::from_utf8(table_csv(&Table::default()).unwrap()).unwrap();
        assert_eq!(empty, "\"\"\n");

        let table = Table {
            columns: Vec::new(),
            rows: vec![Vec::new(), Vec::new()],
        };
        let bytes = table_csv(&table).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn turtle_uses_prefixes() {
        let mut graph = Graph::new();
        graph.insert(&Triple::new(
            NamedNode::new_unchecked("http://example.org/biointegrate/P1"),
            NamedNode::new_unchecked("http://example.org/biointegrate/projectId"),
            Literal::new_simple_literal("TCGA-GBM"),
        ));
        let mut prefixes = PrefixMap::new();
        prefixes.insert("bi".to_string(), "http://example.org/biointegrate/".to_string());
        prefixes.insert("broken".to_string(), "not an iri".to_string());

        let turtle = String::from_utf8(graph_turtle(&graph, &prefixes).unwrap()).unwrap();
        assert!(turtle.contains("@prefix bi: <http://example.org/biointegrate/>"));
        assert!(turtle.contains("bi:P1"));
        assert!(!turtle.contains("broken"));
    }
}
