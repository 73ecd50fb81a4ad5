use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::domain::{QueryKind, slugify};
use crate::error::RunnerError;
use crate::prefixes::parse_declarations;
use crate::term::PrefixMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub recursive: bool,
    pub extensions: Vec<String>,
    /// Restrict the pack to these names (file stem or file name).
    pub only: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            extensions: vec!["rq".to_string()],
            only: Vec::new(),
        }
    }
}

/// One query file of the pack. The text is read lazily so an unreadable file
/// still yields an execution record instead of aborting discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryUnit {
    pub path: Utf8PathBuf,
    pub name: String,
}

impl QueryUnit {
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    pub fn load(&self) -> Result<QuerySource, RunnerError> {
        let text =
            fs::read_to_string(self.path.as_std_path()).map_err(|err| RunnerError::QueryRead {
                path: self.path.as_std_path().to_path_buf(),
                message: err.to_string(),
            })?;
        let declared = parse_declarations(&text);
        Ok(QuerySource { text, declared })
    }
}

#[derive(Debug, Clone)]
pub struct QuerySource {
    pub text: String,
    pub declared: PrefixMap,
}

/// Lists query files under `root` in lexicographic path order and assigns
/// each a unique output slug.
pub fn discover(root: &Utf8Path, options: &DiscoveryOptions) -> Result<Vec<QueryUnit>, RunnerError> {
    if !root.as_std_path().is_dir() {
        return Err(RunnerError::QueriesDirNotFound(root.as_std_path().to_path_buf()));
    }

    let mut paths = Vec::new();
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    for entry in WalkDir::new(root.as_std_path()).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(|err| RunnerError::Filesystem(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|path| RunnerError::InvalidOption(format!("non-utf8 query path {}", path.display())))?;
        let matches_ext = path
            .extension()
            .map(|ext| options.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches_ext {
            paths.push(path);
        }
    }
    paths.sort();

    if !options.only.is_empty() {
        paths = select(paths, &options.only);
    }
    if paths.is_empty() {
        return Err(RunnerError::NoQueries(root.as_std_path().to_path_buf()));
    }

    let mut used = BTreeSet::new();
    let units = paths
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path.as_path()).with_extension("");
            let base = slugify(relative.as_str());
            let mut name = base.clone();
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{base}_{n}");
                n += 1;
            }
            QueryUnit { path, name }
        })
        .collect::<Vec<_>>();

    tracing::debug!(root = %root, count = units.len(), "queries discovered");
    Ok(units)
}

fn select(paths: Vec<Utf8PathBuf>, only: &[String]) -> Vec<Utf8PathBuf> {
    for wanted in only {
        let found = paths
            .iter()
            .any(|path| path.file_stem() == Some(wanted.as_str()) || path.file_name() == Some(wanted.as_str()));
        if !found {
            tracing::warn!(query = %wanted, "requested query not found");
        }
    }
    paths
        .into_iter()
        .filter(|path| {
            only.iter().any(|wanted| {
                path.file_stem() == Some(wanted.as_str()) || path.file_name() == Some(wanted.as_str())
            })
        })
        .collect()
}

/// Best-effort query form detection.
///
/// Scans the text for the first query-form keyword, skipping comment lines,
/// IRIs and string literals. Reaching `WHERE` or a group `{` first means the
/// form could not be determined. Correct for conventionally written queries;
/// unusual formatting may misclassify.
pub fn classify(text: &str) -> QueryKind {
    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let mut chars = line.char_indices().peekable();
        while let Some((start, ch)) = chars.next() {
            match ch {
                '<' => {
                    for (_, c) in chars.by_ref() {
                        if c == '>' {
                            break;
                        }
                    }
                }
                '"' | '\'' => {
                    for (_, c) in chars.by_ref() {
                        if c == ch {
                            break;
                        }
                    }
                }
                '{' => return QueryKind::Unknown,
                '#' => break,
                c if is_word_char(c) => {
                    let mut end = start + c.len_utf8();
                    while let Some(&(idx, next)) = chars.peek() {
                        if !is_word_char(next) {
                            break;
                        }
                        end = idx + next.len_utf8();
                        chars.next();
                    }
                    let word = line[start..end].to_ascii_uppercase();
                    match word.as_str() {
                        "SELECT" => return QueryKind::Select,
                        "ASK" => return QueryKind::Ask,
                        "CONSTRUCT" => return QueryKind::Construct,
                        "DESCRIBE" => return QueryKind::Describe,
                        "WHERE" => return QueryKind::Unknown,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }
    QueryKind::Unknown
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.' | '?' | '$')
}
