use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Graph, GraphNameRef, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::RunnerError;
use crate::term::{PrefixMap, core_prefixes};

/// The graph exactly as parsed from its source file. Never mutated after
/// loading; compatibility triples only ever land in a [`WorkingGraph`].
#[derive(Debug, Clone)]
pub struct SourceGraph {
    path: Utf8PathBuf,
    triples: Graph,
    prefixes: PrefixMap,
}

impl SourceGraph {
    pub fn load(path: &Utf8Path) -> Result<Self, RunnerError> {
        if !path.as_std_path().is_file() {
            return Err(RunnerError::GraphNotFound(path.as_std_path().to_path_buf()));
        }
        let file = File::open(path.as_std_path()).map_err(|err| RunnerError::GraphRead {
            path: path.as_std_path().to_path_buf(),
            message: err.to_string(),
        })?;

        let format = guess_format(path);
        tracing::debug!(graph = %path, format = ?format, "parsing graph");
        let mut parser = RdfParser::from_format(format).for_reader(BufReader::new(file));
        let mut triples = Graph::new();
        for quad in parser.by_ref() {
            let quad = quad.map_err(|err| RunnerError::GraphParse {
                path: path.as_std_path().to_path_buf(),
                message: err.to_string(),
            })?;
            triples.insert(&Triple::from(quad));
        }

        let mut prefixes = core_prefixes();
        for (name, iri) in parser.prefixes() {
            prefixes.insert(name.to_string(), iri.to_string());
        }

        Ok(Self {
            path: path.to_path_buf(),
            triples,
            prefixes,
        })
    }

    pub fn from_parts(path: Utf8PathBuf, triples: Graph, prefixes: PrefixMap) -> Self {
        Self {
            path,
            triples,
            prefixes,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn triples(&self) -> &Graph {
        &self.triples
    }

    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

/// Query-ready copy of a [`SourceGraph`], possibly augmented with derived
/// triples. Shared read-only by every query of a run.
pub struct WorkingGraph {
    store: Store,
    prefixes: PrefixMap,
    source_len: usize,
    len: usize,
}

impl WorkingGraph {
    /// `triples` is the source triple set, possibly augmented by the
    /// compatibility layer.
    pub fn build(source: &SourceGraph, triples: Graph) -> Result<Self, RunnerError> {
        let store = Store::new().map_err(|err| RunnerError::Store(err.to_string()))?;
        for triple in triples.iter() {
            store
                .insert(triple.in_graph(GraphNameRef::DefaultGraph))
                .map_err(|err| RunnerError::Store(err.to_string()))?;
        }
        Ok(Self {
            store,
            prefixes: source.prefixes().clone(),
            source_len: source.len(),
            len: triples.len(),
        })
    }

    pub fn query(&self, sparql: &str) -> Result<QueryResults, String> {
        self.store.query(sparql).map_err(|err| err.to_string())
    }

    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    /// Triple count of the graph as loaded from disk.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Triple count queries actually run against.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_materialized(&self) -> bool {
        self.len != self.source_len
    }
}

fn guess_format(path: &Utf8Path) -> RdfFormat {
    let ext = path.extension().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "owl" | "xml" => RdfFormat::RdfXml,
        other => RdfFormat::from_extension(other).unwrap_or(RdfFormat::Turtle),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn guess_format_from_extension() {
        assert_eq!(guess_format(Utf8Path::new("a/export.ttl")), RdfFormat::Turtle);
        assert_eq!(guess_format(Utf8Path::new("a/export.nt")), RdfFormat::NTriples);
        assert_eq!(guess_format(Utf8Path::new("a/onto.owl")), RdfFormat::RdfXml);
        assert_eq!(guess_format(Utf8Path::new("a/export")), RdfFormat::Turtle);
    }

    #[test]
    fn load_keeps_declared_prefixes() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("g.ttl")).unwrap();
        std::fs::write(
            path.as_std_path(),
            "@prefix bi: <http://example.org/biointegrate/> .\nbi:TP53 a bi:Gene .\n",
        )
        .unwrap();

        let graph = SourceGraph::load(&path).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.prefixes()["bi"], "http://example.org/biointegrate/");
        assert!(graph.prefixes().contains_key("rdf"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = SourceGraph::load(Utf8Path::new("/nonexistent/graph.ttl")).unwrap_err();
        assert_matches!(err, RunnerError::GraphNotFound(_));
    }
}
