//! # Path Types
//!
//! Three kinds of path string move through the storage layer, and each one has
//! its own type so they cannot be mixed up silently:
//!
//! | Type | Origin | Trust |
//! |------|--------|-------|
//! | [`LogicalPath`] | written inside content (`src="../img/a.png"`) | untrusted |
//! | [`SafeRelativePath`] | produced by normalization | normalized, relative, non-escaping |
//! | [`ProvenanceUri`] | produced by a store | opaque `<scheme>://<path>` |
//!
//! A `LogicalPath` only becomes a `SafeRelativePath` through
//! [`SafeRelativePath::new`] or a store's `resolve_relative_path`, both of which
//! reject null bytes, absolute paths and `..` segments that climb above the root.
//! The string normalization here is purely lexical; stores backed by a real
//! filesystem repeat the checks against the disk (see `store::sandbox`).

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FILE_SCHEME: &str = "file";
pub const MEMORY_SCHEME: &str = "memory";
pub const REMOTE_SCHEME: &str = "remote";
pub const GIT_SCHEME: &str = "git";
pub const DATABASE_SCHEME: &str = "db";

const SCHEME_SEPARATOR: &str = "://";

pub(crate) fn reject_null_byte(raw: &str) -> Result<()> {
    if raw.contains('\0') {
        return Err(StoreError::NullByteRejected);
    }
    Ok(())
}

fn is_absolute(raw: &str) -> bool {
    if raw.starts_with('/') {
        return true;
    }
    // Windows drive prefix, e.g. `C:` or `c:/`
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lexically normalize a relative path: backslashes become `/`, empty and `.`
/// segments are dropped and `..` pops the previous segment.
///
/// Fails with [`StoreError::PathEscapesRoot`] when the path is absolute or when
/// a `..` would climb above the root.
pub(crate) fn normalize_relative(raw: &str) -> Result<String> {
    reject_null_byte(raw)?;

    let unified = raw.replace('\\', "/");
    if is_absolute(&unified) {
        return Err(StoreError::PathEscapesRoot(raw.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StoreError::PathEscapesRoot(raw.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// An untrusted path exactly as it appears in authored content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Brand a raw reference. Only null bytes are rejected here; traversal is
    /// judged later, relative to a concrete base.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        reject_null_byte(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized path relative to one store's root. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SafeRelativePath(String);

impl SafeRelativePath {
    pub fn new(raw: &str) -> Result<Self> {
        normalize_relative(raw).map(Self)
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a relative child; the result is normalized again.
    pub fn join(&self, child: &str) -> Result<Self> {
        if self.is_root() {
            return Self::new(child);
        }
        Self::new(&format!("{}/{}", self.0, child))
    }

    /// Directory part, `""` for top-level entries.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// True when `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &SafeRelativePath) -> bool {
        prefix.is_root()
            || self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0[prefix.0.len()..].starts_with('/'))
    }
}

impl TryFrom<String> for SafeRelativePath {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(&raw)
    }
}

impl From<SafeRelativePath> for String {
    fn from(path: SafeRelativePath) -> Self {
        path.0
    }
}

impl fmt::Display for SafeRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve `relative` against the directory of `base_file` (itself a path
/// relative to the store root).
pub fn resolve_against(base_file: &str, relative: &LogicalPath) -> Result<SafeRelativePath> {
    let reference = relative.as_str();
    reject_null_byte(reference)?;
    if is_absolute(&reference.replace('\\', "/")) {
        return Err(StoreError::PathEscapesRoot(reference.to_string()));
    }

    let base = normalize_relative(base_file)?;
    let dir = base.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let combined = if dir.is_empty() {
        reference.to_string()
    } else {
        format!("{}/{}", dir, reference)
    };
    SafeRelativePath::new(&combined)
}

/// `<scheme>://<path>`: which store, which path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProvenanceUri(String);

impl ProvenanceUri {
    pub fn new(scheme: &str, path: &str) -> Self {
        Self(format!("{}{}{}", scheme, SCHEME_SEPARATOR, path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        reject_null_byte(raw)?;
        let (scheme, _) = raw
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| StoreError::InvalidProvenance(raw.to_string()))?;
        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
        if !valid_scheme {
            return Err(StoreError::InvalidProvenance(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn scheme(&self) -> &str {
        self.0
            .split_once(SCHEME_SEPARATOR)
            .map(|(scheme, _)| scheme)
            .unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.0
            .split_once(SCHEME_SEPARATOR)
            .map(|(_, path)| path)
            .unwrap_or("")
    }

    /// Return the path part if this URI uses `scheme`, otherwise
    /// [`StoreError::UnsupportedProvenance`].
    pub fn path_for_scheme(&self, scheme: &str) -> Result<&str> {
        if self.scheme() != scheme {
            return Err(StoreError::UnsupportedProvenance(self.0.clone()));
        }
        Ok(self.path())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProvenanceUri {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<ProvenanceUri> for String {
    fn from(uri: ProvenanceUri) -> Self {
        uri.0
    }
}

impl fmt::Display for ProvenanceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logical(raw: &str) -> LogicalPath {
        LogicalPath::new(raw).unwrap()
    }

    #[test]
    fn test_normalizes_dot_segments() {
        let path = SafeRelativePath::new("./a/b/../b/./file.olx").unwrap();
        assert_eq!(path.as_str(), "a/b/file.olx");
    }

    #[test]
    fn test_backslashes_are_separators() {
        let path = SafeRelativePath::new("a\\b\\c.md").unwrap();
        assert_eq!(path.as_str(), "a/b/c.md");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        for raw in [
            "..",
            "../x.olx",
            "./../x.olx",
            "a/../../x.olx",
            "..\\x.olx",
            "a\\..\\..\\x.olx",
            "../../../etc/passwd",
        ] {
            let err = SafeRelativePath::new(raw).unwrap_err();
            assert!(matches!(err, StoreError::PathEscapesRoot(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn test_rejects_absolute_paths() {
        for raw in ["/etc/passwd", "\\windows\\system32", "C:\\x", "c:/x"] {
            let err = SafeRelativePath::new(raw).unwrap_err();
            assert!(matches!(err, StoreError::PathEscapesRoot(_)), "{raw}");
        }
    }

    #[test]
    fn test_rejects_null_bytes_anywhere() {
        for raw in ["\0a.olx", "a\0.olx", "a.olx\0"] {
            assert!(matches!(
                SafeRelativePath::new(raw),
                Err(StoreError::NullByteRejected)
            ));
            assert!(matches!(
                LogicalPath::new(raw),
                Err(StoreError::NullByteRejected)
            ));
        }
    }

    #[test]
    fn test_path_accessors() {
        let path = SafeRelativePath::new("subdir/deep/file.olx").unwrap();
        assert_eq!(path.parent(), "subdir/deep");
        assert_eq!(path.file_name(), "file.olx");
        assert_eq!(path.extension(), Some("olx"));

        let top = SafeRelativePath::new("lesson.olx").unwrap();
        assert_eq!(top.parent(), "");
        assert_eq!(SafeRelativePath::new(".hidden").unwrap().extension(), None);
    }

    #[test]
    fn test_starts_with_respects_segment_boundaries() {
        let base = SafeRelativePath::new("sub").unwrap();
        assert!(SafeRelativePath::new("sub/a.md").unwrap().starts_with(&base));
        assert!(SafeRelativePath::new("sub").unwrap().starts_with(&base));
        assert!(!SafeRelativePath::new("subway/a.md").unwrap().starts_with(&base));
        assert!(SafeRelativePath::new("x").unwrap().starts_with(&SafeRelativePath::root()));
    }

    #[test]
    fn test_resolve_sibling() {
        let resolved = resolve_against("subdir/lesson.olx", &logical("notes.md")).unwrap();
        assert_eq!(resolved.as_str(), "subdir/notes.md");
    }

    #[test]
    fn test_resolve_parent_reference() {
        let resolved = resolve_against("subdir/deep/file.olx", &logical("../notes.md")).unwrap();
        assert_eq!(resolved.as_str(), "subdir/notes.md");
    }

    #[test]
    fn test_resolve_from_top_level() {
        let resolved = resolve_against("lesson.olx", &logical("img/a.png")).unwrap();
        assert_eq!(resolved.as_str(), "img/a.png");
    }

    #[test]
    fn test_resolve_rejects_escape_and_absolute() {
        assert!(matches!(
            resolve_against("subdir/lesson.olx", &logical("../../x.md")),
            Err(StoreError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            resolve_against("subdir/lesson.olx", &logical("/x.md")),
            Err(StoreError::PathEscapesRoot(_))
        ));
    }

    #[test]
    fn test_provenance_parts() {
        let uri = ProvenanceUri::new(FILE_SCHEME, "/srv/content/a.olx");
        assert_eq!(uri.as_str(), "file:///srv/content/a.olx");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.path(), "/srv/content/a.olx");
        assert_eq!(uri.path_for_scheme(FILE_SCHEME).unwrap(), "/srv/content/a.olx");
        assert!(matches!(
            uri.path_for_scheme(MEMORY_SCHEME),
            Err(StoreError::UnsupportedProvenance(_))
        ));
    }

    #[test]
    fn test_provenance_parse() {
        assert_eq!(
            ProvenanceUri::parse("memory://a/b.olx").unwrap().path(),
            "a/b.olx"
        );
        assert!(ProvenanceUri::parse("no-scheme").is_err());
        assert!(ProvenanceUri::parse("://x").is_err());
        assert!(ProvenanceUri::parse("bad scheme://x").is_err());
    }

    #[test]
    fn test_serde_validates_safe_paths() {
        let ok: SafeRelativePath = serde_json::from_str("\"a/./b.olx\"").unwrap();
        assert_eq!(ok.as_str(), "a/b.olx");
        assert!(serde_json::from_str::<SafeRelativePath>("\"../b.olx\"").is_err());
    }
}
