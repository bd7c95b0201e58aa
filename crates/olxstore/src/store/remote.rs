//! # Remote Store
//!
//! The [`ContentStore`] contract over HTTP. Three endpoints are configured:
//!
//! | Method | Endpoint | Operation |
//! |--------|----------|-----------|
//! | GET    | `{file}?path=P` | read |
//! | HEAD   | `{file}?path=P` | existence (provenance, asset checks) |
//! | PUT    | `{file}` | write (409 + `{conflict, metadata}` on version conflict) |
//! | DELETE | `{file}?path=P` | delete |
//! | PATCH  | `{file}` | rename |
//! | GET    | `{list}?path=B` | list_files |
//! | POST   | `{grep}` | grep |
//!
//! ## Namespaces
//!
//! With a namespace configured, every outgoing path is prefixed with it and
//! every returned path must carry it. A returned path outside the namespace
//! is an integrity failure ([`StoreError::NamespaceMismatch`]), never
//! silently dropped. Provenance is `remote://<namespaced path>`.
//!
//! ## Not offered
//!
//! Incremental scans need a server-side change feed; `load_xml_files_with_stats`
//! fails with [`StoreError::Unsupported`]. `glob` runs client-side over the
//! listing.

use super::ContentStore;
use crate::error::{Result, StoreError};
use crate::extensions::is_media_file;
use crate::model::{
    DirEntry, FileEntry, FileMetadata, GrepMatch, GrepOptions, ListSelection, ReadResult,
    ScanResult, TreeEntry, WriteOptions,
};
use crate::paths::{resolve_against, LogicalPath, ProvenanceUri, SafeRelativePath, REMOTE_SCHEME};
use crate::search::{finalize_glob, finalize_grep, GlobQuery};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Single-file operations.
    pub file_url: Url,
    pub list_url: Url,
    pub grep_url: Url,
    /// Segment prepended to every path, so one deployment can host several roots.
    pub namespace: Option<String>,
    pub timeout_secs: u64,
}

impl RemoteConfig {
    /// Endpoints `file`, `list` and `grep` below `base`.
    pub fn from_base(base: &Url) -> Result<Self> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let join = |segment: &str| {
            base.join(segment)
                .map_err(|e| StoreError::Store(format!("invalid remote url {base}: {e}")))
        };
        Ok(Self {
            file_url: join("file")?,
            list_url: join("list")?,
            grep_url: join("grep")?,
            namespace: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let trimmed = namespace.trim_matches('/');
        self.namespace = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }
}

// -- Wire types ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FileResponse {
    path: String,
    content: String,
    metadata: FileMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    path: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_metadata: Option<&'a FileMetadata>,
    force: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConflictResponse {
    #[serde(default)]
    metadata: Option<FileMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest<'a> {
    path: &'a str,
    new_path: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrepRequest<'a> {
    pattern: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<&'a str>,
    limit: usize,
    ignore_case: bool,
}

#[derive(Debug, Deserialize)]
struct WireGrepMatch {
    path: String,
    line: usize,
    content: String,
}

// -- Client -------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Path as the server sees it.
    fn namespaced(&self, path: &SafeRelativePath) -> String {
        match (&self.config.namespace, path.is_root()) {
            (Some(ns), true) => ns.clone(),
            (Some(ns), false) => format!("{ns}/{path}"),
            (None, _) => path.to_string(),
        }
    }

    /// Inverse of [`Self::namespaced`] for paths coming back from the server.
    fn strip_namespace(&self, raw: &str) -> Result<SafeRelativePath> {
        let Some(ns) = &self.config.namespace else {
            return SafeRelativePath::new(raw);
        };
        if raw == ns {
            return Ok(SafeRelativePath::root());
        }
        match raw.strip_prefix(ns.as_str()).and_then(|rest| rest.strip_prefix('/')) {
            Some(rest) => SafeRelativePath::new(rest),
            None => Err(StoreError::NamespaceMismatch {
                expected: ns.clone(),
                actual: raw.to_string(),
            }),
        }
    }

    fn strip_tree(&self, dir: DirEntry) -> Result<DirEntry> {
        let path = self.strip_namespace(dir.path.as_str())?;
        let mut children = BTreeMap::new();
        for (name, child) in dir.children {
            let child = match child {
                TreeEntry::File(file) => TreeEntry::File(FileEntry {
                    path: self.strip_namespace(file.path.as_str())?,
                    ..file
                }),
                TreeEntry::Directory(sub) => TreeEntry::Directory(self.strip_tree(sub)?),
            };
            children.insert(name, child);
        }
        Ok(DirEntry {
            name: if path.is_root() {
                String::new()
            } else {
                path.file_name().to_string()
            },
            path,
            children,
        })
    }

    async fn check(resp: Response, path: &SafeRelativePath) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let message = resp.text().await.unwrap_or_default();
        Err(StoreError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    /// HEAD the file endpoint: `Ok(false)` on 404.
    async fn exists(&self, path: &SafeRelativePath) -> Result<bool> {
        let resp = self
            .http
            .head(self.config.file_url.clone())
            .query(&[("path", self.namespaced(path))])
            .send()
            .await?;
        match Self::check(resp, path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ContentStore for RemoteStore {
    fn scheme(&self) -> &'static str {
        REMOTE_SCHEME
    }

    async fn read(&self, path: &SafeRelativePath) -> Result<ReadResult> {
        let resp = self
            .http
            .get(self.config.file_url.clone())
            .query(&[("path", self.namespaced(path))])
            .send()
            .await?;
        let body: FileResponse = Self::check(resp, path).await?.json().await?;
        self.strip_namespace(&body.path)?;
        Ok(ReadResult {
            content: body.content,
            metadata: body.metadata,
        })
    }

    async fn write(
        &self,
        path: &SafeRelativePath,
        content: &str,
        options: WriteOptions,
    ) -> Result<()> {
        let remote_path = self.namespaced(path);
        let request = WriteRequest {
            path: &remote_path,
            content,
            previous_metadata: options.previous_metadata.as_ref(),
            force: options.force,
        };
        let resp = self
            .http
            .put(self.config.file_url.clone())
            .json(&request)
            .send()
            .await?;

        if resp.status() == StatusCode::CONFLICT {
            let body: ConflictResponse = resp.json().await.unwrap_or_default();
            return Err(StoreError::VersionConflict {
                path: path.to_string(),
                current: body.metadata,
            });
        }
        Self::check(resp, path).await?;
        info!(path = %path, remote = %remote_path, forced = options.force, "wrote remote file");
        Ok(())
    }

    async fn delete(&self, path: &SafeRelativePath) -> Result<()> {
        let resp = self
            .http
            .delete(self.config.file_url.clone())
            .query(&[("path", self.namespaced(path))])
            .send()
            .await?;
        Self::check(resp, path).await?;
        info!(path = %path, "deleted remote file");
        Ok(())
    }

    async fn rename(&self, from: &SafeRelativePath, to: &SafeRelativePath) -> Result<()> {
        let (old, new) = (self.namespaced(from), self.namespaced(to));
        let resp = self
            .http
            .patch(self.config.file_url.clone())
            .json(&RenameRequest {
                path: &old,
                new_path: &new,
            })
            .send()
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        Self::check(resp, from).await?;
        info!(from = %from, to = %to, "renamed remote file");
        Ok(())
    }

    async fn list_files(&self, selection: &ListSelection) -> Result<DirEntry> {
        let base = selection.base();
        let mut request = self
            .http
            .get(self.config.list_url.clone())
            .query(&[("path", self.namespaced(&base))]);
        if let Some(depth) = selection.max_depth {
            request = request.query(&[("maxDepth", depth)]);
        }
        let resp = request.send().await?;
        let tree: DirEntry = Self::check(resp, &base).await?.json().await?;
        self.strip_tree(tree)
    }

    async fn load_xml_files_with_stats(&self, _previous: Option<&ScanResult>) -> Result<ScanResult> {
        Err(StoreError::Unsupported(
            "incremental scan of a remote store; use list_files + read, or server-side change detection"
                .to_string(),
        ))
    }

    async fn resolve_relative_path(
        &self,
        base: &ProvenanceUri,
        relative: &LogicalPath,
    ) -> Result<SafeRelativePath> {
        let remote_path = base.path_for_scheme(REMOTE_SCHEME)?;
        let local = self.strip_namespace(remote_path).map_err(|e| match e {
            StoreError::NamespaceMismatch { .. } => StoreError::UnsupportedProvenance(base.to_string()),
            other => other,
        })?;
        resolve_against(local.as_str(), relative)
    }

    async fn to_provenance_uri(&self, path: &SafeRelativePath) -> Result<ProvenanceUri> {
        if !self.exists(path).await? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(ProvenanceUri::new(REMOTE_SCHEME, &self.namespaced(path)))
    }

    async fn validate_asset_path(&self, path: &SafeRelativePath) -> Result<bool> {
        if !is_media_file(path.as_str()) {
            return Ok(false);
        }
        self.exists(path).await
    }

    async fn glob(
        &self,
        pattern: &str,
        base: Option<&SafeRelativePath>,
    ) -> Result<Vec<SafeRelativePath>> {
        let query = GlobQuery::new(pattern, base)?;
        let tree = self
            .list_files(&ListSelection::under(query.base().clone()))
            .await?;
        let matches = tree
            .file_paths()
            .into_iter()
            .filter(|path| query.matches(path))
            .collect();
        Ok(finalize_glob(matches))
    }

    async fn grep(&self, pattern: &str, options: &GrepOptions) -> Result<Vec<GrepMatch>> {
        let request = GrepRequest {
            pattern,
            base_path: options
                .base_path
                .as_ref()
                .map(|base| self.namespaced(base))
                .or_else(|| self.config.namespace.clone()),
            include: options.include.as_deref(),
            limit: options.limit,
            ignore_case: options.ignore_case,
        };
        let resp = self
            .http
            .post(self.config.grep_url.clone())
            .json(&request)
            .send()
            .await?;
        let root = SafeRelativePath::root();
        let wire: Vec<WireGrepMatch> = Self::check(resp, &root).await?.json().await?;
        debug!(pattern, matches = wire.len(), "remote grep");

        let matches = wire
            .into_iter()
            .map(|m| {
                Ok(GrepMatch {
                    path: self.strip_namespace(&m.path)?,
                    line: m.line,
                    content: m.content,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(finalize_grep(matches, options.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn p(raw: &str) -> SafeRelativePath {
        SafeRelativePath::new(raw).unwrap()
    }

    async fn store(server: &MockServer, namespace: Option<&str>) -> RemoteStore {
        let base: Url = format!("{}/api", server.uri()).parse().unwrap();
        let mut config = RemoteConfig::from_base(&base).unwrap();
        config.timeout_secs = 5;
        if let Some(ns) = namespace {
            config = config.with_namespace(ns);
        }
        RemoteStore::new(config).unwrap()
    }

    fn meta_json() -> serde_json::Value {
        json!({ "mtime": "2026-01-15T12:00:00Z", "size": 11 })
    }

    #[test]
    fn test_config_from_base() {
        let base: Url = "http://example.test/content".parse().unwrap();
        let config = RemoteConfig::from_base(&base).unwrap().with_namespace("/course-a/");
        assert_eq!(config.file_url.as_str(), "http://example.test/content/file");
        assert_eq!(config.list_url.as_str(), "http://example.test/content/list");
        assert_eq!(config.grep_url.as_str(), "http://example.test/content/grep");
        assert_eq!(config.namespace.as_deref(), Some("course-a"));
    }

    // --- GET {file} ---

    #[tokio::test]
    async fn test_read_prefixes_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/file"))
            .and(query_param("path", "course-a/lesson.olx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "course-a/lesson.olx",
                "content": "<vertical/>",
                "metadata": meta_json(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server, Some("course-a")).await;
        let result = store.read(&p("lesson.olx")).await.unwrap();
        assert_eq!(result.content, "<vertical/>");
        assert_eq!(result.metadata.size, 11);
        assert!(result.metadata.mtime.is_some());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/file"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server, None).await;
        assert!(matches!(
            store.read(&p("missing.olx")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_rejects_path_outside_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "course-b/lesson.olx",
                "content": "other tenant",
                "metadata": meta_json(),
            })))
            .mount(&server)
            .await;

        let store = store(&server, Some("course-a")).await;
        match store.read(&p("lesson.olx")).await {
            Err(StoreError::NamespaceMismatch { expected, actual }) => {
                assert_eq!(expected, "course-a");
                assert_eq!(actual, "course-b/lesson.olx");
            }
            other => panic!("expected namespace mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/file"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = store(&server, None).await;
        match store.read(&p("a.olx")).await {
            Err(StoreError::Remote { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    // --- PUT {file} ---

    #[tokio::test]
    async fn test_write_sends_metadata_and_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/file"))
            .and(body_partial_json(json!({
                "path": "course-a/a.olx",
                "content": "<problem/>",
                "previousMetadata": meta_json(),
                "force": false,
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server, Some("course-a")).await;
        let previous: FileMetadata = serde_json::from_value(meta_json()).unwrap();
        store
            .write(&p("a.olx"), "<problem/>", WriteOptions::expecting(previous))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_conflict_maps_to_version_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/file"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "conflict": true,
                "metadata": { "mtime": "2026-02-01T08:30:00Z", "size": 42 },
            })))
            .mount(&server)
            .await;

        let store = store(&server, None).await;
        let stale: FileMetadata = serde_json::from_value(meta_json()).unwrap();
        match store
            .write(&p("a.olx"), "x", WriteOptions::expecting(stale))
            .await
        {
            Err(StoreError::VersionConflict { path, current }) => {
                assert_eq!(path, "a.olx");
                assert_eq!(current.unwrap().size, 42);
            }
            other => panic!("expected version conflict, got {:?}", other),
        }
    }

    // --- DELETE / PATCH {file} ---

    #[tokio::test]
    async fn test_delete_and_rename() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/file"))
            .and(query_param("path", "ns/old.olx"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/file"))
            .and(body_partial_json(json!({ "path": "ns/a.olx", "newPath": "ns/b.olx" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server, Some("ns")).await;
        store.delete(&p("old.olx")).await.unwrap();
        store.rename(&p("a.olx"), &p("b.olx")).await.unwrap();
    }

    // --- HEAD {file} ---

    #[tokio::test]
    async fn test_provenance_requires_existence_and_round_trips() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/file"))
            .and(query_param("path", "ns/subdir/lesson.olx"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/api/file"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server, Some("ns")).await;
        let uri = store.to_provenance_uri(&p("subdir/lesson.olx")).await.unwrap();
        assert_eq!(uri.as_str(), "remote://ns/subdir/lesson.olx");

        let sibling = store
            .resolve_relative_path(&uri, &LogicalPath::new("notes.md").unwrap())
            .await
            .unwrap();
        assert_eq!(sibling, p("subdir/notes.md"));

        assert!(matches!(
            store.to_provenance_uri(&p("missing.olx")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.validate_asset_path(&p("img/missing.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_rejects_other_namespace_and_scheme() {
        let server = MockServer::start().await;
        let store = store(&server, Some("ns")).await;
        let rel = LogicalPath::new("a.md").unwrap();

        let other_ns = ProvenanceUri::new(REMOTE_SCHEME, "other/lesson.olx");
        assert!(matches!(
            store.resolve_relative_path(&other_ns, &rel).await,
            Err(StoreError::UnsupportedProvenance(_))
        ));
        let file = ProvenanceUri::new("file", "/tmp/lesson.olx");
        assert!(matches!(
            store.resolve_relative_path(&file, &rel).await,
            Err(StoreError::UnsupportedProvenance(_))
        ));
    }

    // --- GET {list} ---

    #[tokio::test]
    async fn test_list_files_strips_namespace_and_globs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .and(query_param("path", "ns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ns",
                "path": "ns",
                "children": {
                    "lesson.olx": { "type": "file", "name": "lesson.olx", "path": "ns/lesson.olx", "kind": "olx" },
                    "subdir": {
                        "type": "directory", "name": "subdir", "path": "ns/subdir",
                        "children": {
                            "notes.md": { "type": "file", "name": "notes.md", "path": "ns/subdir/notes.md", "kind": "markdown" }
                        }
                    }
                }
            })))
            .mount(&server)
            .await;

        let store = store(&server, Some("ns")).await;
        let tree = store.list_files(&ListSelection::default()).await.unwrap();
        assert!(tree.path.is_root());
        assert_eq!(tree.file_paths(), vec![p("lesson.olx"), p("subdir/notes.md")]);

        let olx = store.glob("**/*.olx", None).await.unwrap();
        assert_eq!(olx, vec![p("lesson.olx")]);
    }

    #[tokio::test]
    async fn test_list_files_rejects_foreign_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ns",
                "path": "ns",
                "children": {
                    "x.olx": { "type": "file", "name": "x.olx", "path": "elsewhere/x.olx", "kind": "olx" }
                }
            })))
            .mount(&server)
            .await;

        let store = store(&server, Some("ns")).await;
        assert!(matches!(
            store.list_files(&ListSelection::default()).await,
            Err(StoreError::NamespaceMismatch { .. })
        ));
    }

    // --- POST {grep} ---

    #[tokio::test]
    async fn test_grep_strips_namespace_and_orders() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/grep"))
            .and(body_partial_json(json!({ "pattern": "choice", "basePath": "ns", "limit": 1000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "path": "ns/b.olx", "line": 3, "content": "<choice/>" },
                { "path": "ns/a.olx", "line": 1, "content": "choice" },
            ])))
            .mount(&server)
            .await;

        let store = store(&server, Some("ns")).await;
        let matches = store.grep("choice", &GrepOptions::default()).await.unwrap();
        let keys: Vec<_> = matches.iter().map(|m| (m.path.as_str(), m.line)).collect();
        assert_eq!(keys, vec![("a.olx", 1), ("b.olx", 3)]);
    }

    #[tokio::test]
    async fn test_scan_is_unsupported() {
        let server = MockServer::start().await;
        let store = store(&server, None).await;
        assert!(matches!(
            store.load_xml_files_with_stats(None).await,
            Err(StoreError::Unsupported(_))
        ));
    }
}
