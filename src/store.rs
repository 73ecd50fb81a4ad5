use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::error::RunnerError;

/// Output root of one run. All artifact writes go through here so a dry run
/// can suppress them in one place.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: Utf8PathBuf,
    dry_run: bool,
}

impl OutputStore {
    pub fn new(root: Utf8PathBuf, dry_run: bool) -> Self {
        Self { root, dry_run }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn query_dir(&self, slug: &str) -> Utf8PathBuf {
        self.root.join(slug)
    }

    pub fn ensure_root(&self) -> Result<(), RunnerError> {
        if self.dry_run {
            return Ok(());
        }
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| RunnerError::Filesystem(format!("create {}: {err}", self.root)))
    }

    /// Empties a query's output directory so artifacts from earlier runs do
    /// not linger next to the new ones.
    pub fn reset_dir(&self, dir: &Utf8Path) -> Result<(), RunnerError> {
        if self.dry_run {
            return Ok(());
        }
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| RunnerError::Filesystem(format!("clear {dir}: {err}")))?;
        }
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| RunnerError::Filesystem(format!("create {dir}: {err}")))
    }

    pub fn write_json<T: Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), RunnerError> {
        let mut content = serde_json::to_vec_pretty(value)
            .map_err(|err| RunnerError::Filesystem(err.to_string()))?;
        content.push(b'\n');
        self.write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(&self, path: &Utf8Path, content: &[u8]) -> Result<(), RunnerError> {
        if self.dry_run {
            tracing::debug!(path = %path, bytes = content.len(), "dry run, write skipped");
            return Ok(());
        }
        let parent = path
            .parent()
            .ok_or_else(|| RunnerError::Filesystem(format!("invalid output path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| RunnerError::Filesystem(format!("create {parent}: {err}")))?;
        let mut temp = Builder::new()
            .prefix(".kira-sr")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| RunnerError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| RunnerError::Filesystem(format!("write {path}: {err}")))?;
        temp.persist(path.as_std_path())
            .map_err(|err| RunnerError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(utf8(temp.path()), false);
        let path = store.query_dir("q01").join("result.csv");

        store.write_bytes_atomic(&path, b"a\n1\n").unwrap();
        store.write_bytes_atomic(&path, b"a\n2\n").unwrap();

        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "a\n2\n");
        let leftovers = fs::read_dir(store.query_dir("q01").as_std_path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path()).join("out");
        let store = OutputStore::new(root.clone(), true);
        store.ensure_root().unwrap();
        store.reset_dir(&store.query_dir("q01")).unwrap();
        store.write_json(&root.join("index.json"), &serde_json::json!({"ok": true})).unwrap();
        assert!(!root.as_std_path().exists());
    }

    #[test]
    fn reset_dir_drops_stale_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(utf8(temp.path()), false);
        let dir = store.query_dir("q02");
        store.write_bytes_atomic(&dir.join("result.csv"), b"old").unwrap();
        store.reset_dir(&dir).unwrap();
        assert!(dir.as_std_path().is_dir());
        assert!(!dir.join("result.csv").as_std_path().exists());
    }
}
