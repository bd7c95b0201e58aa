//! # Configuration
//!
//! Store configuration is a [`confique`] config loaded in priority order:
//!
//! 1. **Environment**: `OLXSTORE_CONTENT_DIR` only (see below).
//! 2. **Config file**: `olxstore.toml`, located by the caller.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `base_dir` | `.` | Root of the local store |
//! | `read_roots` | `[]` | Extra directories reads may reach (shared content) |
//! | `write_roots` | `[]` | Extra directories writes may reach |
//! | `extra_content_dir` | unset | Added to both allow-lists; env `OLXSTORE_CONTENT_DIR` |
//! | `grep_limit` | `1000` | Default cap on grep results |
//! | `remote_url` | unset | Base URL of a remote store (`{url}/file`, `/list`, `/grep`) |
//! | `remote_list_url` | unset | Overrides the listing endpoint |
//! | `remote_grep_url` | unset | Overrides the grep endpoint |
//! | `remote_namespace` | unset | Namespace segment for the remote store |
//! | `remote_timeout_secs` | `30` | Request timeout for the remote store |
//!
//! `extra_content_dir` is the one externally configurable part of the
//! sandbox. It exists for tests and ad hoc content roots; everything else about
//! the allow-lists comes from the file.

use crate::error::{Result, StoreError};
use crate::model::GrepOptions;
use crate::store::sandbox::Sandbox;
use crate::store::{ContentStore, LayeredStore, LocalStore, RemoteConfig, RemoteStore};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

pub const CONTENT_DIR_ENV: &str = "OLXSTORE_CONTENT_DIR";
pub const CONFIG_FILE_NAME: &str = "olxstore.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory of the local store.
    #[config(default = ".")]
    pub base_dir: PathBuf,

    /// Additional read-only content roots.
    #[config(default = [])]
    pub read_roots: Vec<PathBuf>,

    /// Additional writable roots.
    #[config(default = [])]
    pub write_roots: Vec<PathBuf>,

    #[config(env = "OLXSTORE_CONTENT_DIR")]
    pub extra_content_dir: Option<PathBuf>,

    #[config(default = 1000)]
    pub grep_limit: usize,

    pub remote_url: Option<String>,
    pub remote_list_url: Option<String>,
    pub remote_grep_url: Option<String>,
    pub remote_namespace: Option<String>,

    #[config(default = 30)]
    pub remote_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            read_roots: Vec::new(),
            write_roots: Vec::new(),
            extra_content_dir: None,
            grep_limit: 1000,
            remote_url: None,
            remote_list_url: None,
            remote_grep_url: None,
            remote_namespace: None,
            remote_timeout_secs: 30,
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| StoreError::Store(format!("invalid url {raw:?}: {e}")))
}

impl StoreConfig {
    /// Load from the environment and, when given and present, a TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        builder
            .load()
            .map_err(|e| StoreError::Store(format!("failed to load configuration: {e}")))
    }

    /// Sandbox for the local store: base directory plus every configured root.
    pub fn sandbox(&self) -> Result<Sandbox> {
        let mut sandbox = Sandbox::new(&self.base_dir)?;
        for root in &self.read_roots {
            sandbox = sandbox.with_read_root(root)?;
        }
        for root in &self.write_roots {
            sandbox = sandbox.with_write_root(root)?;
        }
        if let Some(extra) = &self.extra_content_dir {
            sandbox = sandbox.with_read_root(extra)?.with_write_root(extra)?;
        }
        Ok(sandbox)
    }

    pub fn local_store(&self) -> Result<LocalStore> {
        Ok(LocalStore::with_sandbox(self.sandbox()?))
    }

    /// Remote endpoints, if a remote store is configured.
    pub fn remote_config(&self) -> Result<Option<RemoteConfig>> {
        let Some(base) = &self.remote_url else {
            return Ok(None);
        };
        let mut config = RemoteConfig::from_base(&parse_url(base)?)?;
        if let Some(list) = &self.remote_list_url {
            config.list_url = parse_url(list)?;
        }
        if let Some(grep) = &self.remote_grep_url {
            config.grep_url = parse_url(grep)?;
        }
        if let Some(namespace) = &self.remote_namespace {
            config = config.with_namespace(namespace.as_str());
        }
        config.timeout_secs = self.remote_timeout_secs;
        Ok(Some(config))
    }

    /// The configured stack: the local store first (and writable), then the
    /// remote store when one is configured.
    pub fn build_store(&self) -> Result<LayeredStore> {
        let mut stores: Vec<Arc<dyn ContentStore>> = vec![Arc::new(self.local_store()?)];
        if let Some(remote) = self.remote_config()? {
            stores.push(Arc::new(RemoteStore::new(remote)?));
        }
        Ok(LayeredStore::new(stores))
    }

    pub fn grep_options(&self) -> GrepOptions {
        GrepOptions {
            limit: self.grep_limit,
            ..Default::default()
        }
    }
}
