//! Read-only in-memory store.
//!
//! Backs inline content bundles, previews and tests. Keys may carry an
//! optional base prefix (`course/lesson.olx` with base `course`); lookups try
//! the exact key first, then the base-prefixed key. Provenance is
//! `memory://<key>` for the key actually present, so the store never claims a
//! file it does not hold.

use super::ContentStore;
use crate::error::{Result, StoreError};
use crate::extensions::{is_content_file, is_media_file, ContentKind};
use crate::model::{
    DirEntry, FileMetadata, FileRecord, GrepMatch, GrepOptions, ListSelection, ReadResult,
    ScanResult, WriteOptions,
};
use crate::paths::{resolve_against, LogicalPath, ProvenanceUri, SafeRelativePath, MEMORY_SCHEME};
use crate::search::{finalize_glob, finalize_grep, GlobQuery, GrepQuery};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, String>,
    base_path: Option<SafeRelativePath>,
}

fn metadata_for(content: &str) -> FileMetadata {
    FileMetadata {
        mtime: None,
        size: content.len() as u64,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(path, content)` pairs. Keys that do not normalize to a
    /// safe relative path are dropped.
    pub fn from_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (path, content) in files {
            store = store.with_file(path.as_ref(), content);
        }
        store
    }

    pub fn with_base_path(mut self, base: SafeRelativePath) -> Self {
        self.base_path = Some(base);
        self
    }

    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        match SafeRelativePath::new(path) {
            Ok(safe) => {
                self.files.insert(safe.as_str().to_string(), content.into());
            }
            Err(e) => warn!(path = %path.escape_default(), error = %e, "dropping unsafe in-memory path"),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Key holding `path`: the exact key, else the base-prefixed one.
    fn key_for(&self, path: &SafeRelativePath) -> Option<&str> {
        if let Some((key, _)) = self.files.get_key_value(path.as_str()) {
            return Some(key);
        }
        let base = self.base_path.as_ref()?;
        let prefixed = base.join(path.as_str()).ok()?;
        self.files
            .get_key_value(prefixed.as_str())
            .map(|(key, _)| key.as_str())
    }

    /// Key with the base prefix removed, as callers address it.
    fn logical_key<'a>(&self, key: &'a str) -> &'a str {
        match &self.base_path {
            Some(base) if !base.is_root() => key
                .strip_prefix(base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(key),
            _ => key,
        }
    }

    /// True for `memory://` ids under this store's base path, if it has one.
    fn owns(&self, id: &ProvenanceUri) -> bool {
        let Ok(key) = id.path_for_scheme(MEMORY_SCHEME) else {
            return false;
        };
        match &self.base_path {
            Some(base) if !base.is_root() => SafeRelativePath::new(key)
                .map(|key| key.starts_with(base))
                .unwrap_or(false),
            _ => true,
        }
    }

    fn paths(&self) -> impl Iterator<Item = (SafeRelativePath, &str)> {
        self.files.iter().filter_map(|(key, content)| {
            SafeRelativePath::new(self.logical_key(key))
                .ok()
                .map(|path| (path, content.as_str()))
        })
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn scheme(&self) -> &'static str {
        MEMORY_SCHEME
    }

    async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult> {
        let key = self
            .key_for(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let content = self.files[key].clone();
        Ok(ReadResult {
            metadata: metadata_for(&content),
            content,
        })
    }

    async fn write(&self, _path: &SafeRelativePath, _content: &str, _options: WriteOptions) -> Result<()> {
        Err(StoreError::ReadOnlyStore)
    }

    async fn update(&self, _path: &SafeRelativePath, _content: &str) -> Result<()> {
        Err(StoreError::ReadOnlyStore)
    }

    async fn delete(&self, _path: &SafeRelativePath) -> Result<()> {
        Err(StoreError::ReadOnlyStore)
    }

    async fn rename(&self, _from: &SafeRelativePath, _to: &SafeRelativePath) -> Result<()> {
        Err(StoreError::ReadOnlyStore)
    }

    async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry> {
        let base = selection.base();
        let mut tree = if base.is_root() {
            DirEntry::root()
        } else {
            DirEntry::named(base.clone())
        };
        let base_depth = if base.is_root() {
            0
        } else {
            base.as_str().split('/').count()
        };

        for (path, _) in self.paths() {
            if !path.starts_with(&base) || path == base {
                continue;
            }
            if let Some(max) = selection.max_depth {
                if path.as_str().split('/').count() - base_depth > max {
                    continue;
                }
            }
            if let Some(kind) = ContentKind::from_path(path.as_str()) {
                tree.insert_file(&path, kind);
            }
        }
        Ok(tree)
    }

    async fn load_xml_files_with_stats(&self, previous: Option<&ScanResult>) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        let mut seen = HashSet::new();

        for (key, content) in &self.files {
            if !is_content_file(key) {
                continue;
            }
            let (Some(kind), Ok(path)) = (
                ContentKind::from_path(key),
                SafeRelativePath::new(self.logical_key(key)),
            ) else {
                continue;
            };
            let id = ProvenanceUri::new(MEMORY_SCHEME, key);
            seen.insert(id.clone());

            let prior = previous.and_then(|prev| prev.get_current(&id));
            match prior {
                Some(prior) if prior.content == *content => {
                    result.unchanged.insert(id, prior.clone());
                }
                _ => {
                    let record = FileRecord {
                        id: id.clone(),
                        path,
                        kind,
                        metadata: metadata_for(content),
                        content: content.clone(),
                    };
                    if prior.is_some() {
                        result.changed.insert(id, record);
                    } else {
                        result.added.insert(id, record);
                    }
                }
            }
        }

        if let Some(previous) = previous {
            for record in previous.current() {
                if self.owns(&record.id) && !seen.contains(&record.id) {
                    result.deleted.insert(record.id.clone(), record.clone());
                }
            }
        }
        Ok(result)
    }

    async fn resolve_relative_path(
        &self,
        base: &ProvenanceUri,
        relative: &LogicalPath,
    ) -> Result<SafeRelativePath> {
        let key = base.path_for_scheme(MEMORY_SCHEME)?;
        resolve_against(self.logical_key(key), relative)
    }

    async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri> {
        self.key_for(path)
            .map(|key| ProvenanceUri::new(MEMORY_SCHEME, key))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool> {
        Ok(is_media_file(path.as_str()) && self.key_for(path).is_some())
    }

    async fn glob(
        &self,
        pattern: &str,
        base: Option<&SafeRelativePath>,
    ) -> Result<Vec<SafeRelativePath>> {
        let query = GlobQuery::new(pattern, base)?;
        let matches = self
            .paths()
            .map(|(path, _)| path)
            .filter(|path| query.matches(path))
            .collect();
        Ok(finalize_glob(matches))
    }

    async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
        let query = GrepQuery::new(pattern, options)?;
        let mut matches = Vec::new();
        for (path, content) in self.paths() {
            if query.accepts(&path) && query.scan(&path, content, &mut matches) {
                break;
            }
        }
        Ok(finalize_grep(matches, query.limit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> SafeRelativePath {
        SafeRelativePath::new(raw).unwrap()
    }

    fn logical(raw: &str) -> LogicalPath {
        LogicalPath::new(raw).unwrap()
    }

    fn sample() -> MemoryStore {
        MemoryStore::from_files([
            ("lesson.olx", "<vertical/>"),
            ("subdir/notes.md", "# Notes\nsee figure"),
            ("subdir/lesson.olx", "<problem/>"),
            ("subdir/deep/file.olx", "<html/>"),
            ("img/fig.png", "png"),
        ])
    }

    #[tokio::test]
    async fn test_read() {
        let store = sample();
        let result = store.read(&p("subdir/notes.md")).await.unwrap();
        assert_eq!(result.content, "# Notes\nsee figure");
        assert_eq!(result.metadata.size, 18);
        assert_eq!(result.metadata.mtime, None);

        assert!(matches!(
            store.read(&p("nope.olx")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_every_mutation_is_read_only() {
        let store = sample();
        let path = p("lesson.olx");
        assert!(matches!(
            store.write(&path, "x", WriteOptions::default()).await,
            Err(StoreError::ReadOnlyStore)
        ));
        assert!(matches!(
            store.write(&path, "x", WriteOptions::default().forced()).await,
            Err(StoreError::ReadOnlyStore)
        ));
        assert!(matches!(
            store.update(&path, "x").await,
            Err(StoreError::ReadOnlyStore)
        ));
        assert!(matches!(
            store.delete(&path).await,
            Err(StoreError::ReadOnlyStore)
        ));
        assert!(matches!(
            store.rename(&path, &p("other.olx")).await,
            Err(StoreError::ReadOnlyStore)
        ));
        assert_eq!(store.read(&path).await.unwrap().content, "<vertical/>");
    }

    #[tokio::test]
    async fn test_resolution_scenario() {
        let store = sample();
        let base = store.to_provenance_uri(&p("subdir/lesson.olx")).await.unwrap();
        assert_eq!(base.as_str(), "memory://subdir/lesson.olx");
        assert_eq!(
            store.resolve_relative_path(&base, &logical("notes.md")).await.unwrap(),
            p("subdir/notes.md")
        );

        let deep = store.to_provenance_uri(&p("subdir/deep/file.olx")).await.unwrap();
        assert_eq!(
            store.resolve_relative_path(&deep, &logical("../notes.md")).await.unwrap(),
            p("subdir/notes.md")
        );
    }

    #[tokio::test]
    async fn test_resolve_rejects_foreign_scheme_and_escape() {
        let store = sample();
        let file = ProvenanceUri::new("file", "/tmp/lesson.olx");
        assert!(matches!(
            store.resolve_relative_path(&file, &logical("a.md")).await,
            Err(StoreError::UnsupportedProvenance(_))
        ));

        let base = ProvenanceUri::new(MEMORY_SCHEME, "lesson.olx");
        assert!(matches!(
            store.resolve_relative_path(&base, &logical("../x.md")).await,
            Err(StoreError::PathEscapesRoot(_))
        ));
    }

    #[tokio::test]
    async fn test_provenance_only_for_held_files() {
        let store = sample();
        assert!(store.to_provenance_uri(&p("lesson.olx")).await.is_ok());
        assert!(matches!(
            store.to_provenance_uri(&p("missing.olx")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_base_path_prefix() {
        let store = MemoryStore::new()
            .with_base_path(p("course"))
            .with_file("course/lesson.olx", "<vertical/>")
            .with_file("course/media/a.png", "png");

        assert_eq!(store.read(&p("lesson.olx")).await.unwrap().content, "<vertical/>");
        let uri = store.to_provenance_uri(&p("lesson.olx")).await.unwrap();
        assert_eq!(uri.as_str(), "memory://course/lesson.olx");
        assert_eq!(
            store
                .resolve_relative_path(&uri, &logical("media/a.png"))
                .await
                .unwrap(),
            p("media/a.png")
        );
        assert!(store.validate_asset_path(&p("media/a.png")).await.unwrap());

        let tree = store.list_files(&ListSelection::default()).await.unwrap();
        assert_eq!(tree.file_paths(), vec![p("lesson.olx")]);
    }

    #[tokio::test]
    async fn test_unsafe_keys_are_dropped() {
        let store = MemoryStore::new()
            .with_file("../escape.olx", "x")
            .with_file("ok.olx", "y");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_files_with_depth() {
        let store = sample();
        let selection = ListSelection {
            base_path: Some(p("subdir")),
            max_depth: Some(1),
        };
        let tree = store.list_files(&selection).await.unwrap();
        assert_eq!(
            tree.file_paths(),
            vec![p("subdir/lesson.olx"), p("subdir/notes.md")]
        );
    }

    #[tokio::test]
    async fn test_scan_compares_content() {
        let first_store = sample();
        let first = first_store.load_xml_files_with_stats(None).await.unwrap();
        assert_eq!(first.added.len(), 4);

        let again = first_store.load_xml_files_with_stats(Some(&first)).await.unwrap();
        assert!(!again.has_changes());
        assert_eq!(again.unchanged.len(), 4);

        let edited = MemoryStore::from_files([
            ("lesson.olx", "<vertical>changed</vertical>"),
            ("subdir/notes.md", "# Notes\nsee figure"),
            ("subdir/lesson.olx", "<problem/>"),
        ]);
        let diff = edited.load_xml_files_with_stats(Some(&first)).await.unwrap();
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.unchanged.len(), 2);
        assert_eq!(diff.deleted.len(), 1);
        assert!(diff.added.is_empty());
    }

    #[tokio::test]
    async fn test_scan_only_deletes_ids_under_base_path() {
        let other = MemoryStore::from_files([("other/a.olx", "<a/>")]);
        let snapshot = other.load_xml_files_with_stats(None).await.unwrap();

        let store = MemoryStore::new()
            .with_base_path(p("course"))
            .with_file("course/lesson.olx", "<vertical/>");
        let scan = store.load_xml_files_with_stats(Some(&snapshot)).await.unwrap();
        assert!(scan.deleted.is_empty());
        assert_eq!(scan.added.len(), 1);
    }

    #[tokio::test]
    async fn test_glob_and_grep() {
        let store = sample();
        assert_eq!(
            store.glob("**/*.olx", Some(&p("subdir"))).await.unwrap(),
            vec![p("subdir/deep/file.olx"), p("subdir/lesson.olx")]
        );
        assert_eq!(
            store.glob("*.png", Some(&p("img"))).await.unwrap(),
            vec![p("img/fig.png")]
        );

        let matches = store.grep("figure", &GrepOptions::default()).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, p("subdir/notes.md"));
        assert_eq!(matches[0].line, 2);
    }

    #[tokio::test]
    async fn test_validate_asset_path() {
        let store = sample();
        assert!(store.validate_asset_path(&p("img/fig.png")).await.unwrap());
        assert!(!store.validate_asset_path(&p("img/other.png")).await.unwrap());
        assert!(!store.validate_asset_path(&p("lesson.olx")).await.unwrap());
    }
}
