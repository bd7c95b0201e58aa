//! # Local Disk Store
//!
//! Files under a base directory, with every path going through the
//! [`Sandbox`]. Provenance is `file://<absolute path>`.
//!
//! ## Walking
//!
//! Listing, scanning, globbing and grepping walk the tree below the base
//! directory without following symlinks, skipping dotfiles and editor
//! artifacts (names containing `~` or `#`). Walks run on the blocking pool.
//!
//! ## Writes
//!
//! Content is written to a dot-prefixed temp file next to the target and
//! renamed into place, so a reader never sees a half-written file and an
//! interrupted write leaves only an ignored temp file behind.

use super::sandbox::Sandbox;
use super::ContentStore;
use crate::error::{Result, StoreError};
use crate::extensions::{is_content_file, is_ignored_name, is_media_file, ContentKind};
use crate::model::{
    DirEntry, FileMetadata, FileRecord, GrepMatch, GrepOptions, ListSelection, ReadResult,
    ScanResult, WriteOptions,
};
use crate::paths::{resolve_against, LogicalPath, ProvenanceUri, SafeRelativePath, FILE_SCHEME};
use crate::search::{finalize_glob, finalize_grep, GlobQuery, GrepQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub struct LocalStore {
    sandbox: Sandbox,
}

fn metadata_of(meta: &std::fs::Metadata) -> FileMetadata {
    FileMetadata {
        mtime: meta.modified().ok().map(DateTime::<Utc>::from),
        size: meta.len(),
    }
}

/// Walk `start` and return every regular file as a path relative to `base`.
fn walk_files(base: &Path, start: &Path, max_depth: Option<usize>) -> Vec<SafeRelativePath> {
    if !start.is_dir() {
        return Vec::new();
    }

    let mut walker = WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || entry
                .file_name()
                .to_str()
                .map(|name| !is_ignored_name(name))
                .unwrap_or(false)
    });
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during walk");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rest) = entry.path().strip_prefix(base) else {
            continue;
        };
        let Some(rel) = rest
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        if let Ok(path) = SafeRelativePath::new(&rel.join("/")) {
            files.push(path);
        }
    }
    files
}

impl LocalStore {
    /// Store rooted at `base_dir` with the default allow-lists (the base
    /// directory only, for both reads and writes).
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            sandbox: Sandbox::new(base_dir)?,
        })
    }

    pub fn with_sandbox(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    pub fn base_dir(&self) -> &Path {
        self.sandbox.base_dir()
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    fn provenance_for(&self, absolute: &Path) -> ProvenanceUri {
        ProvenanceUri::new(FILE_SCHEME, &absolute.to_string_lossy())
    }

    /// True for `file://` ids under this store's base directory.
    fn owns(&self, id: &ProvenanceUri) -> bool {
        id.path_for_scheme(FILE_SCHEME)
            .map(|p| Path::new(p).starts_with(self.base_dir()))
            .unwrap_or(false)
    }

    async fn stat(&self, absolute: &Path) -> Result<Option<FileMetadata>> {
        match fs::metadata(absolute).await {
            Ok(meta) if meta.is_file() => Ok(Some(metadata_of(&meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn walk(&self, start: PathBuf, max_depth: Option<usize>) -> Result<Vec<SafeRelativePath>> {
        let base = self.base_dir().to_path_buf();
        tokio::task::spawn_blocking(move || walk_files(&base, &start, max_depth))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))
    }

    async fn read_optional(&self, absolute: &Path) -> Result<Option<String>> {
        match fs::read_to_string(absolute).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = %absolute.display(), "skipping file that is not valid UTF-8");
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn ensure_parent(&self, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    fn scheme(&self) -> &'static str {
        FILE_SCHEME
    }

    async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult> {
        let absolute = self.sandbox.resolve_read(path.as_str()).await?;
        let metadata = self
            .stat(&absolute)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let content = match fs::read_to_string(&absolute).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(ReadResult { content, metadata })
    }

    async fn write(
        &self,
        path: &SafeRelativePath,
        content: &str,
        options: WriteOptions,
    ) -> Result<()> {
        let target = self.sandbox.resolve_write(path.as_str()).await?;

        if !options.force {
            if let Some(previous) = &options.previous_metadata {
                match self.stat(&target).await? {
                    None => {
                        return Err(StoreError::VersionConflict {
                            path: path.to_string(),
                            current: None,
                        })
                    }
                    Some(current) if current.mtime != previous.mtime => {
                        return Err(StoreError::VersionConflict {
                            path: path.to_string(),
                            current: Some(current),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        self.ensure_parent(&target).await?;

        // Atomic write: temp file in the same directory, then rename
        let dir = target.parent().unwrap_or(self.base_dir());
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }

        info!(path = %path, bytes = content.len(), forced = options.force, "wrote file");
        Ok(())
    }

    async fn delete(&self, path: &SafeRelativePath) -> Result<()> {
        let target = self.sandbox.resolve_write(path.as_str()).await?;
        if self.stat(&target).await?.is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        fs::remove_file(&target).await?;
        info!(path = %path, "deleted file");
        Ok(())
    }

    async fn rename(&self, from: &SafeRelativePath, to: &SafeRelativePath) -> Result<()> {
        let source = self.sandbox.resolve_write(from.as_str()).await?;
        let target = self.sandbox.resolve_write(to.as_str()).await?;

        if self.stat(&source).await?.is_none() {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if fs::symlink_metadata(&target).await.is_ok() {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }

        self.ensure_parent(&target).await?;
        fs::rename(&source, &target).await?;
        info!(from = %from, to = %to, "renamed file");
        Ok(())
    }

    async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry> {
        let base = selection.base();
        let start = self.sandbox.resolve_read(base.as_str()).await?;

        let mut tree = if base.is_root() {
            DirEntry::root()
        } else {
            DirEntry::named(base.clone())
        };
        for path in self.walk(start, selection.max_depth).await? {
            if let Some(kind) = ContentKind::from_path(path.as_str()) {
                tree.insert_file(&path, kind);
            }
        }
        Ok(tree)
    }

    async fn load_xml_files_with_stats(&self, previous: Option<&ScanResult>) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        let mut seen = std::collections::HashSet::new();

        let paths = self.walk(self.base_dir().to_path_buf(), None).await?;
        for path in paths.into_iter().filter(|p| is_content_file(p.as_str())) {
            let Some(kind) = ContentKind::from_path(path.as_str()) else {
                continue;
            };
            let absolute = self.base_dir().join(path.as_str());
            let id = self.provenance_for(&absolute);
            let Some(metadata) = self.stat(&absolute).await? else {
                continue;
            };

            let prior = previous.and_then(|prev| prev.get_current(&id));
            if let Some(prior) = prior {
                if prior.metadata == metadata {
                    seen.insert(id.clone());
                    result.unchanged.insert(id, prior.clone());
                    continue;
                }
            }

            let Some(content) = self.read_optional(&absolute).await? else {
                continue;
            };
            seen.insert(id.clone());
            let record = FileRecord {
                id: id.clone(),
                path,
                kind,
                metadata,
                content,
            };
            if prior.is_some() {
                result.changed.insert(id, record);
            } else {
                result.added.insert(id, record);
            }
        }

        if let Some(previous) = previous {
            for record in previous.current() {
                if self.owns(&record.id) && !seen.contains(&record.id) {
                    result.deleted.insert(record.id.clone(), record.clone());
                }
            }
        }

        debug!(
            base = %self.base_dir().display(),
            added = result.added.len(),
            changed = result.changed.len(),
            unchanged = result.unchanged.len(),
            deleted = result.deleted.len(),
            "scanned content files"
        );
        Ok(result)
    }

    async fn resolve_relative_path(
        &self,
        base: &ProvenanceUri,
        relative: &LogicalPath,
    ) -> Result<SafeRelativePath> {
        let absolute = PathBuf::from(base.path_for_scheme(FILE_SCHEME)?);
        let base_relative = self
            .sandbox
            .relative_of(&absolute)
            .ok_or_else(|| StoreError::UnsupportedProvenance(base.to_string()))?;
        resolve_against(&base_relative, relative)
    }

    async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri> {
        let absolute = self.sandbox.resolve_read(path.as_str()).await?;
        if self.stat(&absolute).await?.is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(self.provenance_for(&absolute))
    }

    async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool> {
        if !is_media_file(path.as_str()) {
            return Ok(false);
        }
        let absolute = self.sandbox.resolve_read(path.as_str()).await?;
        Ok(self.stat(&absolute).await?.is_some())
    }

    async fn glob(
        &self,
        pattern: &str,
        base: Option<&SafeRelativePath>,
    ) -> Result<Vec<SafeRelativePath>> {
        let query = GlobQuery::new(pattern, base)?;
        let start = self.sandbox.resolve_read(query.base().as_str()).await?;
        let matches = self
            .walk(start, None)
            .await?
            .into_iter()
            .filter(|path| query.matches(path))
            .collect();
        Ok(finalize_glob(matches))
    }

    async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
        let query = GrepQuery::new(pattern, options)?;
        let start = self.sandbox.resolve_read(query.base().as_str()).await?;

        // Path order, so stopping at the limit keeps the first matches in output order
        let mut paths = self.walk(start, None).await?;
        paths.sort();

        let mut matches = Vec::new();
        for path in paths {
            if !query.accepts(&path) {
                continue;
            }
            // Each file goes through the sandbox so a symlink planted in the
            // tree cannot leak content from outside the read roots.
            let absolute = match self.sandbox.resolve_read(path.as_str()).await {
                Ok(absolute) => absolute,
                Err(e) => {
                    debug!(path = %path, error = %e, "skipping file during grep");
                    continue;
                }
            };
            let Some(content) = self.read_optional(&absolute).await? else {
                continue;
            };
            if query.scan(&path, &content, &mut matches) {
                break;
            }
        }
        Ok(finalize_grep(matches, query.limit()))
    }
}
