use crate::model::FileMetadata;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported provenance for this store: {0}")]
    UnsupportedProvenance(String),

    #[error("Invalid provenance URI: {0}")]
    InvalidProvenance(String),

    #[error("Path escapes base directory: {0}")]
    PathEscapesRoot(String),

    #[error("Path contains a null byte")]
    NullByteRejected,

    #[error("Symlinks are not allowed as write targets: {}", .0.display())]
    SymlinkRejected(PathBuf),

    #[error("Path is outside the allowed directories: {}", .0.display())]
    OutsideAllowList(PathBuf),

    #[error("Version conflict on {path}: {}", conflict_reason(.current))]
    VersionConflict {
        path: String,
        current: Option<FileMetadata>,
    },

    #[error("Store is read-only")]
    ReadOnlyStore,

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Namespace mismatch: expected prefix {expected:?}, got {actual:?}")]
    NamespaceMismatch { expected: String, actual: String },

    #[error("Target already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Store error: {0}")]
    Store(String),
}

fn conflict_reason(current: &Option<FileMetadata>) -> &'static str {
    if current.is_some() {
        "file was modified"
    } else {
        "file was deleted"
    }
}

impl StoreError {
    /// True for rejections made on safety grounds. These must reach the
    /// caller as-is and never be reported as a missing file.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::PathEscapesRoot(_)
                | StoreError::NullByteRejected
                | StoreError::SymlinkRejected(_)
                | StoreError::OutsideAllowList(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
