//! # Storage Layer
//!
//! This module defines the storage abstraction for olxstore. The [`ContentStore`]
//! trait is the one contract every backing store implements, so callers (the
//! content parser, the CLI, an HTTP layer) never care which store answers.
//!
//! ## Stores
//!
//! - [`local::LocalStore`]: files on disk, behind the [`sandbox::Sandbox`]
//!   allow-list resolver. The only store with a real security boundary.
//! - [`memory::MemoryStore`]: read-only map of path → content, for inline
//!   bundles, previews and tests.
//! - [`remote::RemoteStore`]: the same contract over HTTP endpoints, with a
//!   namespace prefix so one deployment can host several roots.
//! - [`layered::LayeredStore`]: a priority-ordered stack of the above with
//!   union-mount semantics.
//! - [`stubs::GitStore`], [`stubs::DatabaseStore`]: extension points that
//!   answer every call with [`StoreError::NotImplemented`](crate::error::StoreError).
//!
//! ## Reference Resolution
//!
//! ```text
//! parse file  ──provenance──┐
//!                           ▼
//! src="../a.png" ──► resolve_relative_path ──► SafeRelativePath ──► read
//!                                                     │
//!                                      to_provenance_uri (next hop)
//! ```
//!
//! Each store owns exactly one provenance scheme and refuses URIs it does not
//! own; `to_provenance_uri` only succeeds for files the store actually holds.
//! Those two refusals are what let [`layered::LayeredStore`] route a call to
//! the right member by simply trying them in order.
//!
//! ## Conflict Detection
//!
//! Writes are last-writer-wins unless the caller passes the metadata it last
//! saw ([`WriteOptions::previous_metadata`]). A mismatch raises
//! `VersionConflict` carrying the current metadata; `force` skips the check.

use crate::error::Result;
use crate::model::{
    DirEntry, GrepMatch, GrepOptions, ListSelection, ReadResult, ScanResult, WriteOptions,
};
use crate::paths::{LogicalPath, ProvenanceUri, SafeRelativePath};
use async_trait::async_trait;

pub mod layered;
pub mod local;
pub mod memory;
pub mod merge;
pub mod remote;
pub mod sandbox;
pub mod stubs;

pub use layered::LayeredStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use merge::{merge_scans, merge_trees};
pub use remote::{RemoteConfig, RemoteStore};
pub use stubs::{DatabaseStore, GitStore};

/// The operation set every store implements.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Provenance scheme owned by this store.
    fn scheme(&self) -> &'static str;

    /// Read a file. Fails with `NotFound` if this store does not hold it.
    async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult>;

    /// Create or replace a file, honoring optimistic conflict detection.
    async fn write(&self, path: &SafeRelativePath, content: &str, options: WriteOptions)
        -> Result<()>;

    /// `write` without conflict detection.
    async fn update(&self, path: &SafeRelativePath, content: &str) -> Result<()> {
        self.write(path, content, WriteOptions::default()).await
    }

    async fn delete(&self, path: &SafeRelativePath) -> Result<()>;

    async fn rename(&self, from: &SafeRelativePath, to: &SafeRelativePath) -> Result<()>;

    /// Tree of recognized content files.
    async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry>;

    /// Incremental scan against the previous call's result.
    async fn load_xml_files_with_stats(&self, previous: Option<&ScanResult>) -> Result<ScanResult>;

    /// Resolve a reference found in the file at `base`.
    async fn resolve_relative_path(
        &self,
        base: &ProvenanceUri,
        relative: &LogicalPath,
    ) -> Result<SafeRelativePath>;

    /// Provenance of an existing file. Fails with `NotFound` otherwise.
    async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri>;

    /// True only for existing files with a media extension.
    async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool>;

    async fn glob(
        &self,
        pattern: &str,
        base: Option<&SafeRelativePath>,
    ) -> Result<Vec<SafeRelativePath>>;

    async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>>;
}
