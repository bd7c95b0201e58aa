//! Extension points for stores not built yet.
//!
//! Both own a scheme (`git`, `db`) and answer every operation with
//! [`StoreError::NotImplemented`], so they can already sit in a
//! [`LayeredStore`](super::LayeredStore) stack: fan-out calls skip them and
//! ordered calls fall through to the next member.

use super::ContentStore;
use crate::error::{Result, StoreError};
use crate::model::{
    DirEntry, GrepMatch, GrepOptions, ListSelection, ReadResult, ScanResult, WriteOptions,
};
use crate::paths::{LogicalPath, ProvenanceUri, SafeRelativePath, DATABASE_SCHEME, GIT_SCHEME};
use async_trait::async_trait;

macro_rules! not_implemented_store {
    ($store:ident, $scheme:expr, $label:literal) => {
        #[allow(unused_variables)]
        #[async_trait]
        impl ContentStore for $store {
            fn scheme(&self) -> &'static str {
                $scheme
            }

            async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult> {
                Err(StoreError::NotImplemented($label))
            }

            async fn write(
                &self,
                path: &SafeRelativePath,
                content: &str,
                options: WriteOptions,
            ) -> Result<()> {
                Err(StoreError::NotImplemented($label))
            }

            async fn delete(&self, path: &SafeRelativePath) -> Result<()> {
                Err(StoreError::NotImplemented($label))
            }

            async fn rename(&self, from: &SafeRelativePath, to: &SafeRelativePath) -> Result<()> {
                Err(StoreError::NotImplemented($label))
            }

            async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry> {
                Err(StoreError::NotImplemented($label))
            }

            async fn load_xml_files_with_stats(
                &self,
                previous: Option<&ScanResult>,
            ) -> Result<ScanResult> {
                Err(StoreError::NotImplemented($label))
            }

            async fn resolve_relative_path(
                &self,
                base: &ProvenanceUri,
                relative: &LogicalPath,
            ) -> Result<SafeRelativePath> {
                Err(StoreError::NotImplemented($label))
            }

            async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri> {
                Err(StoreError::NotImplemented($label))
            }

            async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool> {
                Err(StoreError::NotImplemented($label))
            }

            async fn glob(
                &self,
                pattern: &str,
                base: Option<&SafeRelativePath>,
            ) -> Result<Vec<SafeRelativePath>> {
                Err(StoreError::NotImplemented($label))
            }

            async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
                Err(StoreError::NotImplemented($label))
            }
        }
    };
}

/// Content served from a version-control repository.
#[derive(Debug, Clone)]
pub struct GitStore {
    pub repository: String,
    pub reference: Option<String>,
}

impl GitStore {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            reference: None,
        }
    }
}

/// Content served from a database table.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    pub connection: String,
}

impl DatabaseStore {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }
}

not_implemented_store!(GitStore, GIT_SCHEME, "git store");
not_implemented_store!(DatabaseStore, DATABASE_SCHEME, "database store");

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> SafeRelativePath {
        SafeRelativePath::new(raw).unwrap()
    }

    async fn assert_all_not_implemented(store: &dyn ContentStore) {
        let path = p("lesson.olx");
        let uri = ProvenanceUri::new(store.scheme(), "lesson.olx");
        let rel = LogicalPath::new("a.md").unwrap();

        let results = vec![
            store.read(&path).await.err(),
            store.write(&path, "x", WriteOptions::default()).await.err(),
            store.update(&path, "x").await.err(),
            store.delete(&path).await.err(),
            store.rename(&path, &p("b.olx")).await.err(),
            store.list_files(&ListSelection::default()).await.err(),
            store.load_xml_files_with_stats(None).await.err(),
            store.resolve_relative_path(&uri, &rel).await.err(),
            store.to_provenance_uri(&path).await.err(),
            store.validate_asset_path(&p("a.png")).await.err(),
            store.glob("*", None).await.err(),
            store.grep("x", &GrepOptions::default()).await.err(),
        ];
        for (idx, err) in results.into_iter().enumerate() {
            assert!(
                matches!(err, Some(StoreError::NotImplemented(_))),
                "call {idx}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_git_store_is_not_implemented() {
        let store = GitStore::new("https://example.test/course.git");
        assert_eq!(store.scheme(), "git");
        assert_all_not_implemented(&store).await;
    }

    #[tokio::test]
    async fn test_database_store_is_not_implemented() {
        let store = DatabaseStore::new("postgres://localhost/content");
        assert_eq!(store.scheme(), "db");
        assert_all_not_implemented(&store).await;
    }
}
