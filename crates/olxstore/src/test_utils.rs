use crate::store::{ContentStore, LocalStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    // Keeps the directory alive until the test is done
    pub _temp_dir: TempDir,
    pub store: LocalStore,
    /// Canonical store root.
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = std::fs::canonicalize(temp_dir.path()).expect("failed to canonicalize temp dir");
        let store = LocalStore::new(&root).expect("failed to open store");
        Self {
            _temp_dir: temp_dir,
            store,
            root,
        }
    }

    /// Write `content` at `relative` below the root, creating directories.
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        write_file(&self.root, relative, content);
        self
    }

    /// Another handle on the same root, for stacking into a layered store.
    pub fn shared_store(&self) -> Arc<dyn ContentStore> {
        Arc::new(LocalStore::with_sandbox(self.store.sandbox().clone()))
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    std::fs::write(path, content).expect("failed to write fixture");
}
