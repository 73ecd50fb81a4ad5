use std::collections::BTreeMap;

use oxigraph::model::TermRef;

/// Prefix name to namespace IRI. Ordered so every rendering of it is stable.
pub type PrefixMap = BTreeMap<String, String>;

/// Bindings every graph exposes unless it rebinds the name itself.
pub fn core_prefixes() -> PrefixMap {
    [
        ("owl", "http://www.w3.org/2002/07/owl#"),
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ]
    .into_iter()
    .map(|(name, iri)| (name.to_string(), iri.to_string()))
    .collect()
}

/// Renders a solution value for tabular output.
///
/// IRIs become `prefix:local` when a namespace in `prefixes` covers them with
/// a local part that is a valid prefixed-name suffix, otherwise the full IRI.
/// Literals render as their lexical form, blank nodes as `_:id`, and an
/// unbound value as the empty string.
pub fn render_term(term: Option<TermRef<'_>>, prefixes: &PrefixMap) -> String {
    match term {
        None => String::new(),
        Some(TermRef::NamedNode(node)) => compact_iri(node.as_str(), prefixes),
        Some(TermRef::BlankNode(node)) => format!("_:{}", node.as_str()),
        Some(TermRef::Literal(literal)) => literal.value().to_string(),
        #[allow(unreachable_patterns)]
        Some(other) => other.to_string(),
    }
}

pub fn compact_iri(iri: &str, prefixes: &PrefixMap) -> String {
    let mut best: Option<(&str, &str)> = None;
    for (name, namespace) in prefixes {
        let Some(local) = iri.strip_prefix(namespace.as_str()) else {
            continue;
        };
        if namespace.is_empty() || !is_local_name(local) {
            continue;
        }
        // Longest namespace wins; BTreeMap order breaks ties by prefix name.
        let better = match best {
            Some((_, current)) => namespace.len() > current.len(),
            None => true,
        };
        if better {
            best = Some((name.as_str(), namespace.as_str()));
        }
    }
    match best {
        Some((name, namespace)) => format!("{name}:{}", &iri[namespace.len()..]),
        None => iri.to_string(),
    }
}

fn is_local_name(local: &str) -> bool {
    !local.ends_with('.')
        && local
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}
