//! # Data Model
//!
//! Values exchanged through the [`ContentStore`](crate::store::ContentStore)
//! contract. Everything here is plain data with serde support, so the same
//! shapes travel over the remote store's wire format unchanged.
//!
//! ## Scan Buckets
//!
//! [`ScanResult`] partitions files into four mutually exclusive buckets keyed by
//! provenance id:
//!
//! - **added**: not present in the previous snapshot
//! - **changed**: present before, store metadata differs now (content re-read)
//! - **unchanged**: present before, metadata identical (previous record carried over)
//! - **deleted**: present before, gone now (previous record kept for reference)
//!
//! Together they cover every id of the previous snapshot plus every id seen in
//! the current pass. Feeding a result back in as `previous` yields the next diff.

use crate::extensions::ContentKind;
use crate::paths::{ProvenanceUri, SafeRelativePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-specific stat blob. `mtime` drives optimistic conflict detection on
/// stores that have one (the in-memory store does not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub mtime: Option<DateTime<Utc>>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub content: String,
    pub metadata: FileMetadata,
}

/// Options for [`ContentStore::write`](crate::store::ContentStore::write).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    /// Metadata the caller last saw. A mismatch with the stored file is a
    /// version conflict unless `force` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_metadata: Option<FileMetadata>,
    #[serde(default)]
    pub force: bool,
}

impl WriteOptions {
    pub fn expecting(previous: FileMetadata) -> Self {
        Self {
            previous_metadata: Some(previous),
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Restricts a listing to a subtree and/or a depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<SafeRelativePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl ListSelection {
    pub fn under(base: SafeRelativePath) -> Self {
        Self {
            base_path: Some(base),
            max_depth: None,
        }
    }

    pub(crate) fn base(&self) -> SafeRelativePath {
        self.base_path.clone().unwrap_or_else(SafeRelativePath::root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: SafeRelativePath,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: SafeRelativePath,
    #[serde(default)]
    pub children: BTreeMap<String, TreeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeEntry {
    File(FileEntry),
    Directory(DirEntry),
}

impl TreeEntry {
    pub fn path(&self) -> &SafeRelativePath {
        match self {
            TreeEntry::File(file) => &file.path,
            TreeEntry::Directory(dir) => &dir.path,
        }
    }
}

impl DirEntry {
    pub fn root() -> Self {
        Self {
            name: String::new(),
            path: SafeRelativePath::root(),
            children: BTreeMap::new(),
        }
    }

    pub fn named(path: SafeRelativePath) -> Self {
        Self {
            name: path.file_name().to_string(),
            path,
            children: BTreeMap::new(),
        }
    }

    /// Insert a file, creating intermediate directories. `path` must lie below
    /// this directory.
    pub fn insert_file(&mut self, path: &SafeRelativePath, kind: ContentKind) {
        let relative = if self.path.is_root() {
            path.as_str()
        } else {
            path.as_str()
                .strip_prefix(self.path.as_str())
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(path.as_str())
        };

        let mut dir = self;
        let mut segments = relative.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                dir.children.insert(
                    segment.to_string(),
                    TreeEntry::File(FileEntry {
                        name: segment.to_string(),
                        path: path.clone(),
                        kind,
                    }),
                );
                return;
            }

            let child_path = match dir.path.join(segment) {
                Ok(p) => p,
                Err(_) => return,
            };
            let entry = dir
                .children
                .entry(segment.to_string())
                .or_insert_with(|| TreeEntry::Directory(DirEntry::named(child_path.clone())));
            if matches!(*entry, TreeEntry::File(_)) {
                *entry = TreeEntry::Directory(DirEntry::named(child_path));
            }
            dir = match entry {
                TreeEntry::Directory(d) => d,
                TreeEntry::File(_) => return,
            };
        }
    }

    /// All file paths in the tree, depth-first in name order.
    pub fn file_paths(&self) -> Vec<SafeRelativePath> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files(&self, out: &mut Vec<SafeRelativePath>) {
        for child in self.children.values() {
            match child {
                TreeEntry::File(file) => out.push(file.path.clone()),
                TreeEntry::Directory(dir) => dir.collect_files(out),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// One recognized content file from a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: ProvenanceUri,
    pub path: SafeRelativePath,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub metadata: FileMetadata,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub added: BTreeMap<ProvenanceUri, FileRecord>,
    pub changed: BTreeMap<ProvenanceUri, FileRecord>,
    pub unchanged: BTreeMap<ProvenanceUri, FileRecord>,
    pub deleted: BTreeMap<ProvenanceUri, FileRecord>,
}

impl ScanResult {
    /// Records that exist as of this scan (everything but `deleted`).
    pub fn current(&self) -> impl Iterator<Item = &FileRecord> {
        self.added
            .values()
            .chain(self.changed.values())
            .chain(self.unchanged.values())
    }

    /// Look up a live record from this snapshot.
    pub fn get_current(&self, id: &ProvenanceUri) -> Option<&FileRecord> {
        self.added
            .get(id)
            .or_else(|| self.changed.get(id))
            .or_else(|| self.unchanged.get(id))
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty())
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.unchanged.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    pub path: SafeRelativePath,
    /// 1-indexed.
    pub line: usize,
    pub content: String,
}

pub const DEFAULT_GREP_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<SafeRelativePath>,
    /// Glob restricting which files are searched, e.g. `**/*.olx`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default = "default_grep_limit")]
    pub limit: usize,
    #[serde(default)]
    pub ignore_case: bool,
}

fn default_grep_limit() -> usize {
    DEFAULT_GREP_LIMIT
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            include: None,
            limit: DEFAULT_GREP_LIMIT,
            ignore_case: false,
        }
    }
}
