use std::fs;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;

use crate::domain::PrefixPrecedence;
use crate::error::RunnerError;
use crate::term::PrefixMap;

static PREFIX_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bPREFIX\s+(\p{L}[\p{L}\p{N}\p{M}_\-.\x{B7}]*)?\s*:\s*<([^>\s]*)>").expect("valid regex")
});

/// Collects every `PREFIX name: <iri>` declaration, ignoring comment lines.
/// A later declaration of the same name replaces the earlier one.
pub fn parse_declarations(text: &str) -> PrefixMap {
    let mut prefixes = PrefixMap::new();
    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        for caps in PREFIX_DECL.captures_iter(line) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            prefixes.insert(name.to_string(), caps[2].to_string());
        }
    }
    prefixes
}

pub fn load_prefix_file(path: &Utf8Path) -> Result<PrefixMap, RunnerError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| RunnerError::PrefixRead {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(parse_declarations(&content))
}

/// Merges graph bindings with an optional external prefix file.
pub fn merge_catalog(
    graph: &PrefixMap,
    external: Option<&PrefixMap>,
    precedence: PrefixPrecedence,
) -> PrefixMap {
    let Some(external) = external else {
        return graph.clone();
    };
    let (base, winner) = match precedence {
        PrefixPrecedence::Graph => (external, graph),
        PrefixPrecedence::External => (graph, external),
    };
    let mut merged = base.clone();
    for (name, iri) in winner {
        if let Some(previous) = merged.get(name) {
            if previous != iri {
                tracing::debug!(prefix = %name, kept = %iri, dropped = %previous, "prefix conflict");
            }
        }
        merged.insert(name.clone(), iri.clone());
    }
    merged
}

/// Injects declarations for every catalog prefix missing from `declared`,
/// the declarations already parsed from `query`. They go above the first
/// non-comment line, which is always inside the prologue. Existing
/// declarations are never touched, so running the enricher on its own output
/// is a no-op.
pub fn enrich(query: &str, declared: &PrefixMap, catalog: &PrefixMap) -> String {
    let missing = catalog
        .iter()
        .filter(|(name, _)| !declared.contains_key(name.as_str()))
        .map(|(name, iri)| format!("PREFIX {name}: <{iri}>"))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return query.to_string();
    }

    let lines = query.lines().collect::<Vec<_>>();
    let insert_at = lines
        .iter()
        .position(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .unwrap_or(lines.len());

    let mut out = Vec::with_capacity(lines.len() + missing.len() + 1);
    out.extend(lines[..insert_at].iter().map(|line| line.to_string()));
    out.extend(missing);
    out.push(String::new());
    out.extend(lines[insert_at..].iter().map(|line| line.to_string()));
    format!("{}\n", out.join("\n").trim())
}
