//! # API Facade
//!
//! The entry point used by the content parser, renderers and the CLI. It is
//! a **thin facade** over one [`ContentStore`] (usually a [`LayeredStore`]):
//!
//! - **Normalizes inputs**: raw strings become [`LogicalPath`] /
//!   [`SafeRelativePath`] here, once, so store code never sees an unchecked
//!   string.
//! - **Composes the consumer flow**: "I am parsing the file at provenance P and
//!   found `src="x"`" becomes resolve, then read, then provenance of the result
//!   (so the next hop can resolve relative to it).
//! - **Returns structured types**: no printing, no formatting.
//!
//! It does not care which store answers, and it holds no state besides the
//! store handle.
//!
//! [`LayeredStore`]: crate::store::LayeredStore

use crate::error::Result;
use crate::extensions::is_media_file;
use crate::model::{
    DirEntry, FileMetadata, GrepMatch, GrepOptions, ListSelection, ReadResult, ScanResult,
    WriteOptions,
};
use crate::paths::{LogicalPath, ProvenanceUri, SafeRelativePath};
use crate::store::ContentStore;
use serde::Serialize;
use std::sync::Arc;

/// A file reached by following a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContent {
    pub path: SafeRelativePath,
    pub provenance: ProvenanceUri,
    pub content: String,
    pub metadata: FileMetadata,
}

#[derive(Clone)]
pub struct ContentApi {
    store: Arc<dyn ContentStore>,
}

impl ContentApi {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Follow a reference found inside the file at `base`.
    pub async fn read_reference(&self, base: &ProvenanceUri, reference: &str) -> Result<ResolvedContent> {
        let logical = LogicalPath::new(reference)?;
        let path = self.store.resolve_relative_path(base, &logical).await?;
        let ReadResult { content, metadata } = self.store.read(&path).await?;
        let provenance = self.store.to_provenance_uri(&path).await?;
        Ok(ResolvedContent {
            path,
            provenance,
            content,
            metadata,
        })
    }

    /// Resolve an asset reference, or `None` when it is not an existing
    /// media file. Security rejections are still errors.
    pub async fn resolve_asset(
        &self,
        base: &ProvenanceUri,
        reference: &str,
    ) -> Result<Option<SafeRelativePath>> {
        let logical = LogicalPath::new(reference)?;
        let path = self.store.resolve_relative_path(base, &logical).await?;
        if !is_media_file(path.as_str()) {
            return Ok(None);
        }
        Ok(self
            .store
            .validate_asset_path(&path)
            .await?
            .then_some(path))
    }

    pub async fn resolve(&self, base: &ProvenanceUri, reference: &str) -> Result<SafeRelativePath> {
        let logical = LogicalPath::new(reference)?;
        self.store.resolve_relative_path(base, &logical).await
    }

    pub async fn provenance_of(&self, path: &str) -> Result<ProvenanceUri> {
        let path = SafeRelativePath::new(path)?;
        self.store.to_provenance_uri(&path).await
    }

    pub async fn read(&self, path: &str) -> Result<ReadResult> {
        let path = SafeRelativePath::new(path)?;
        self.store.read(&path).await
    }

    pub async fn write(&self, path: &str, content: &str, options: WriteOptions) -> Result<()> {
        let path = SafeRelativePath::new(path)?;
        self.store.write(&path, content, options).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = SafeRelativePath::new(path)?;
        self.store.delete(&path).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = SafeRelativePath::new(from)?;
        let to = SafeRelativePath::new(to)?;
        self.store.rename(&from, &to).await
    }

    pub async fn list(&self, selection: &ListSelection) -> Result<DirEntry> {
        self.store.list_files(selection).await
    }

    pub async fn scan(&self, previous: Option<&ScanResult>) -> Result<ScanResult> {
        self.store.load_xml_files_with_stats(previous).await
    }

    pub async fn glob(&self, pattern: &str, base: Option<&str>) -> Result<Vec<SafeRelativePath>> {
        let base = base.map(SafeRelativePath::new).transpose()?;
        self.store.glob(pattern, base.as_ref()).await
    }

    pub async fn search(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
        self.store.grep(pattern, options).await
    }
}
