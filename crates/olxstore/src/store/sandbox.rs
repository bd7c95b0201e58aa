//! # Filesystem Sandbox
//!
//! Turns an untrusted path string into an on-disk path under a store's base
//! directory, or refuses. Reads and writes use **separate** allow-lists: reads
//! may reach shared content roots that must never be written to.
//!
//! ## Resolution
//!
//! 1. Null byte anywhere → `NullByteRejected`.
//! 2. Lexical normalization against the base; absolute paths or `..` climbing
//!    above the base → `PathEscapesRoot`.
//! 3. Reads: if the target exists, its canonical (symlink-resolved) path must
//!    lie in a read root, otherwise `OutsideAllowList`. A missing target is
//!    passed through so the I/O call reports not-found.
//! 4. Writes: an existing target must not be a symlink and its canonical path
//!    must equal the logical one (no symlinked ancestors), otherwise
//!    `SymlinkRejected`; it must lie in a write root. For a new file the nearest
//!    existing ancestor directory gets the same treatment.
//!
//! All roots are canonicalized once at construction, so comparisons happen
//! between canonical paths.

use crate::error::{Result, StoreError};
use crate::paths::{normalize_relative, reject_null_byte};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Sandbox {
    base_dir: PathBuf,
    read_roots: Vec<PathBuf>,
    write_roots: Vec<PathBuf>,
}

fn within(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

impl Sandbox {
    /// Sandbox rooted at `base_dir`, which is both the only read root and the
    /// only write root until more are added.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = std::fs::canonicalize(base_dir.as_ref())?;
        Ok(Self {
            read_roots: vec![base_dir.clone()],
            write_roots: vec![base_dir.clone()],
            base_dir,
        })
    }

    pub fn with_read_root(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        let root = std::fs::canonicalize(dir.as_ref())?;
        if !self.read_roots.contains(&root) {
            self.read_roots.push(root);
        }
        Ok(self)
    }

    pub fn with_write_root(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        let root = std::fs::canonicalize(dir.as_ref())?;
        if !self.write_roots.contains(&root) {
            self.write_roots.push(root);
        }
        Ok(self)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn read_roots(&self) -> &[PathBuf] {
        &self.read_roots
    }

    pub fn write_roots(&self) -> &[PathBuf] {
        &self.write_roots
    }

    fn lexical_join(&self, logical: &str) -> Result<PathBuf> {
        if let Err(e) = reject_null_byte(logical) {
            warn!(path = %logical.escape_default(), "rejected path containing null byte");
            return Err(e);
        }
        let relative = normalize_relative(logical).inspect_err(|_| {
            warn!(path = %logical, base = %self.base_dir.display(), "rejected path escaping base directory");
        })?;
        if relative.is_empty() {
            return Ok(self.base_dir.clone());
        }
        Ok(self.base_dir.join(relative))
    }

    /// Resolve a path for reading.
    pub async fn resolve_read(&self, logical: &str) -> Result<PathBuf> {
        let joined = self.lexical_join(logical)?;
        match fs::canonicalize(&joined).await {
            Ok(canonical) => {
                if !within(&canonical, &self.read_roots) {
                    warn!(
                        path = %logical,
                        target = %canonical.display(),
                        "rejected read outside allowed directories"
                    );
                    return Err(StoreError::OutsideAllowList(canonical));
                }
                Ok(joined)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(joined),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Resolve a path for writing (create, overwrite, delete, rename).
    pub async fn resolve_write(&self, logical: &str) -> Result<PathBuf> {
        let joined = self.lexical_join(logical)?;
        match fs::symlink_metadata(&joined).await {
            Ok(_) => {
                self.check_write_location(&joined).await?;
                Ok(joined)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut ancestor = joined.parent();
                while let Some(dir) = ancestor {
                    match fs::symlink_metadata(dir).await {
                        Ok(_) => {
                            self.check_write_location(dir).await?;
                            return Ok(joined);
                        }
                        Err(e) if e.kind() == ErrorKind::NotFound => ancestor = dir.parent(),
                        Err(e) => return Err(StoreError::Io(e)),
                    }
                }
                Err(StoreError::OutsideAllowList(joined))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// `existing` must be a real (non-symlink) path reached without any
    /// symlinked ancestor, inside a write root.
    async fn check_write_location(&self, existing: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(existing).await?;
        if meta.file_type().is_symlink() {
            warn!(path = %existing.display(), "rejected write through symlink");
            return Err(StoreError::SymlinkRejected(existing.to_path_buf()));
        }
        let canonical = fs::canonicalize(existing).await?;
        if canonical != existing {
            warn!(
                path = %existing.display(),
                target = %canonical.display(),
                "rejected write through symlinked directory"
            );
            return Err(StoreError::SymlinkRejected(existing.to_path_buf()));
        }
        if !within(&canonical, &self.write_roots) {
            warn!(path = %canonical.display(), "rejected write outside allowed directories");
            return Err(StoreError::OutsideAllowList(canonical));
        }
        Ok(())
    }

    /// Store-relative form of an absolute path under the base directory, with
    /// `/` separators. `None` for paths elsewhere or with non-UTF-8 names.
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        let rest = absolute.strip_prefix(&self.base_dir).ok()?;
        let mut parts = Vec::new();
        for component in rest.components() {
            parts.push(component.as_os_str().to_str()?);
        }
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        base: PathBuf,
        outside: PathBuf,
        sandbox: Sandbox,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("content");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(base.join("a/b")).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(base.join("a/b/file.olx"), "<problem/>").unwrap();
        std::fs::write(outside.join("secret.olx"), "secret").unwrap();
        let sandbox = Sandbox::new(&base).unwrap();
        let base = std::fs::canonicalize(&base).unwrap();
        let outside = std::fs::canonicalize(&outside).unwrap();
        Fixture {
            _temp: temp,
            base,
            outside,
            sandbox,
        }
    }

    const TRAVERSALS: &[&str] = &[
        "../secret.olx",
        "../outside/secret.olx",
        "./../outside/secret.olx",
        "a/../../outside/secret.olx",
        "a/b/../../../outside/secret.olx",
        "..\\outside\\secret.olx",
        ".\\..\\outside\\secret.olx",
        "a\\..\\..\\outside\\secret.olx",
        "../../../../../../etc/passwd",
        "/etc/passwd",
    ];

    #[tokio::test]
    async fn test_traversal_is_rejected_for_reads_and_writes() {
        let f = fixture();
        for raw in TRAVERSALS {
            let err = f.sandbox.resolve_read(raw).await.unwrap_err();
            assert!(matches!(err, StoreError::PathEscapesRoot(_)), "read {raw}: {err}");
            let err = f.sandbox.resolve_write(raw).await.unwrap_err();
            assert!(matches!(err, StoreError::PathEscapesRoot(_)), "write {raw}: {err}");
        }
    }

    #[tokio::test]
    async fn test_traversal_inside_root_is_allowed() {
        let f = fixture();
        let resolved = f.sandbox.resolve_read("a/b/../b/file.olx").await.unwrap();
        assert_eq!(resolved, f.base.join("a/b/file.olx"));
    }

    #[tokio::test]
    async fn test_null_byte_is_rejected_in_any_position() {
        let f = fixture();
        for raw in ["\0a.olx", "a/\0b.olx", "a.olx\0"] {
            assert!(matches!(
                f.sandbox.resolve_read(raw).await,
                Err(StoreError::NullByteRejected)
            ));
            assert!(matches!(
                f.sandbox.resolve_write(raw).await,
                Err(StoreError::NullByteRejected)
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_read_target_passes_through() {
        let f = fixture();
        let resolved = f.sandbox.resolve_read("nope/missing.olx").await.unwrap();
        assert_eq!(resolved, f.base.join("nope/missing.olx"));
    }

    #[tokio::test]
    async fn test_new_file_in_new_directory_is_writable() {
        let f = fixture();
        let resolved = f.sandbox.resolve_write("x/y/new.olx").await.unwrap();
        assert_eq!(resolved, f.base.join("x/y/new.olx"));
    }

    #[tokio::test]
    async fn test_relative_of() {
        let f = fixture();
        assert_eq!(
            f.sandbox.relative_of(&f.base.join("a/b/file.olx")).as_deref(),
            Some("a/b/file.olx")
        );
        assert_eq!(f.sandbox.relative_of(&f.outside), None);
    }

    #[tokio::test]
    async fn test_extra_read_root_is_not_writable() {
        let f = fixture();
        let shared = f.outside.clone();
        let sandbox = f.sandbox.clone().with_read_root(&shared).unwrap();

        assert!(sandbox.read_roots().contains(&shared));
        assert!(!sandbox.write_roots().contains(&shared));
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[tokio::test]
        async fn test_symlink_escape_is_rejected_for_reads() {
            let f = fixture();
            symlink(f.outside.join("secret.olx"), f.base.join("link.olx")).unwrap();

            let err = f.sandbox.resolve_read("link.olx").await.unwrap_err();
            assert!(matches!(err, StoreError::OutsideAllowList(_)), "{err}");
        }

        #[tokio::test]
        async fn test_symlink_escape_via_directory_is_rejected_for_reads() {
            let f = fixture();
            symlink(&f.outside, f.base.join("linked_dir")).unwrap();

            let err = f.sandbox.resolve_read("linked_dir/secret.olx").await.unwrap_err();
            assert!(matches!(err, StoreError::OutsideAllowList(_)), "{err}");
        }

        #[tokio::test]
        async fn test_symlink_inside_read_root_is_allowed_for_reads() {
            let f = fixture();
            let sandbox = f.sandbox.clone().with_read_root(&f.outside).unwrap();
            symlink(f.outside.join("secret.olx"), f.base.join("link.olx")).unwrap();

            assert!(sandbox.resolve_read("link.olx").await.is_ok());
        }

        #[tokio::test]
        async fn test_symlink_is_rejected_for_writes_even_inside_root() {
            let f = fixture();
            symlink(f.base.join("a/b/file.olx"), f.base.join("alias.olx")).unwrap();

            let err = f.sandbox.resolve_write("alias.olx").await.unwrap_err();
            assert!(matches!(err, StoreError::SymlinkRejected(_)), "{err}");
        }

        #[tokio::test]
        async fn test_new_file_under_symlinked_directory_is_rejected() {
            let f = fixture();
            symlink(&f.outside, f.base.join("linked_dir")).unwrap();

            let err = f.sandbox.resolve_write("linked_dir/new.olx").await.unwrap_err();
            assert!(matches!(err, StoreError::SymlinkRejected(_)), "{err}");
        }
    }
}
