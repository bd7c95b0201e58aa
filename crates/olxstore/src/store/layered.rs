//! # Layered Store
//!
//! Union mount over a fixed, priority-ordered list of member stores (index 0
//! is the highest priority). The layer is stateless: it holds the member list
//! and nothing else.
//!
//! | Operation | Strategy |
//! |-----------|----------|
//! | `read`, `resolve_relative_path`, `to_provenance_uri` | sequential, first success wins |
//! | `write`, `update`, `delete`, `rename` | member 0 only |
//! | `list_files`, `load_xml_files_with_stats` | all members, failures skipped, folded low to high |
//! | `glob`, `grep` | all members concurrently, union, de-duplicated |
//! | `validate_asset_path` | true if any member says true |
//!
//! Aggregations fail only when every member fails; the last member's error
//! is returned, as for `read`.
//!
//! Layering shadows reads only. Deleting a file from member 0 therefore
//! reveals a lower member's copy at the same path.

use super::merge::{merge_all_scans, merge_all_trees};
use super::ContentStore;
use crate::error::{Result, StoreError};
use crate::model::{
    DirEntry, GrepMatch, GrepOptions, ListSelection, ReadResult, ScanResult, WriteOptions,
};
use crate::paths::{LogicalPath, ProvenanceUri, SafeRelativePath};
use crate::search::{finalize_glob, finalize_grep};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct LayeredStore {
    stores: Vec<Arc<dyn ContentStore>>,
}

impl LayeredStore {
    pub fn new(stores: Vec<Arc<dyn ContentStore>>) -> Self {
        Self { stores }
    }

    /// Append a member below the existing ones.
    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn stores(&self) -> &[Arc<dyn ContentStore>] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    fn writable(&self) -> Result<&Arc<dyn ContentStore>> {
        self.stores
            .first()
            .ok_or_else(|| StoreError::Store("layered store has no member stores".to_string()))
    }
}

/// Successful member results in priority order. Errors are skipped unless no
/// member succeeded, in which case the last one is returned. A bad pattern
/// is the caller's fault and always propagates.
fn successes<T>(what: &str, results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut found = Vec::with_capacity(results.len());
    let mut last_err = None;
    for (idx, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => found.push(value),
            Err(e @ StoreError::InvalidPattern { .. }) => return Err(e),
            Err(e) => {
                debug!(layer = idx, error = %e, "skipping member in {what}");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if found.is_empty() => Err(e),
        _ => Ok(found),
    }
}

#[async_trait]
impl ContentStore for LayeredStore {
    /// Scheme of the writable member; provenance comes from whichever member
    /// owns a file.
    fn scheme(&self) -> &'static str {
        self.stores.first().map(|s| s.scheme()).unwrap_or("layered")
    }

    async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult> {
        let mut last_err = None;
        for (idx, store) in self.stores.iter().enumerate() {
            match store.read(path).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!(layer = idx, scheme = store.scheme(), path = %path, error = %e, "read fell through");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StoreError::NotFound(path.to_string())))
    }

    async fn write(
        &self,
        path: &SafeRelativePath,
        content: &str,
        options: WriteOptions,
    ) -> Result<()> {
        self.writable()?.write(path, content, options).await
    }

    async fn update(&self, path: &SafeRelativePath, content: &str) -> Result<()> {
        self.writable()?.update(path, content).await
    }

    async fn delete(&self, path: &SafeRelativePath) -> Result<()> {
        self.writable()?.delete(path).await
    }

    async fn rename(&self, from: &SafeRelativePath, to: &SafeRelativePath) -> Result<()> {
        self.writable()?.rename(from, to).await
    }

    async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry> {
        let results = join_all(self.stores.iter().map(|s| s.list_files(selection))).await;
        let trees = successes("listing", results)?;

        let mut merged = merge_all_trees(trees);
        if let Some(base) = &selection.base_path {
            if merged.path.is_root() && !base.is_root() {
                merged = DirEntry {
                    children: merged.children,
                    ..DirEntry::named(base.clone())
                };
            }
        }
        Ok(merged)
    }

    async fn load_xml_files_with_stats(&self, previous: Option<&ScanResult>) -> Result<ScanResult> {
        let mut results = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            results.push(store.load_xml_files_with_stats(previous).await);
        }
        Ok(merge_all_scans(successes("scan", results)?))
    }

    async fn resolve_relative_path(
        &self,
        base: &ProvenanceUri,
        relative: &LogicalPath,
    ) -> Result<SafeRelativePath> {
        let mut last_err = None;
        for (idx, store) in self.stores.iter().enumerate() {
            match store.resolve_relative_path(base, relative).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    debug!(layer = idx, base = %base, error = %e, "resolution fell through");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StoreError::UnsupportedProvenance(base.to_string())))
    }

    async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri> {
        let mut last_err = None;
        for (idx, store) in self.stores.iter().enumerate() {
            match store.to_provenance_uri(path).await {
                Ok(uri) => return Ok(uri),
                Err(e) => {
                    debug!(layer = idx, path = %path, error = %e, "provenance fell through");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StoreError::NotFound(path.to_string())))
    }

    async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool> {
        for store in &self.stores {
            match store.validate_asset_path(path).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_security_rejection() => return Err(e),
                Err(e) => debug!(path = %path, error = %e, "asset check fell through"),
            }
        }
        Ok(false)
    }

    async fn glob(
        &self,
        pattern: &str,
        base: Option<&SafeRelativePath>,
    ) -> Result<Vec<SafeRelativePath>> {
        let results = join_all(self.stores.iter().map(|s| s.glob(pattern, base))).await;
        let paths = successes("glob", results)?.into_iter().flatten().collect();
        Ok(finalize_glob(paths))
    }

    async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
        let results = join_all(self.stores.iter().map(|s| s.grep(pattern, options))).await;
        let matches = successes("grep", results)?.into_iter().flatten().collect();
        Ok(finalize_grep(matches, options.limit))
    }
}
