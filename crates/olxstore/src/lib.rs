//! # olxstore Architecture
//!
//! olxstore is the **content storage layer** for course content (OLX, XML,
//! Markdown, PEG files and their media). It answers one question for the
//! layers above it: "given the file I am parsing and a path written inside it,
//! give me that file", without the caller knowing where content lives.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (olxstore-cli) / parser / HTTP handlers                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Validates raw strings into path types                    │
//! │  - resolve → read → provenance of the result                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - ContentStore trait                                       │
//! │  - LocalStore (sandboxed disk), MemoryStore, RemoteStore    │
//! │  - LayeredStore (union mount over the others)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: Paths Are Typed
//!
//! Untrusted strings written inside content are [`paths::LogicalPath`]s. They
//! only reach a store's I/O as a [`paths::SafeRelativePath`], and a store
//! names where a file came from with a [`paths::ProvenanceUri`]. Converting
//! between them is always an explicit, validated step.
//!
//! ## Key Principle: Unsafe Is Not Missing
//!
//! Security rejections (traversal, null bytes, symlinks, allow-list) are
//! distinct errors and are never reported as "not found". See
//! [`error::StoreError::is_security_rejection`].
//!
//! ## Module Overview
//!
//! - [`api`]: Consumer-facing facade
//! - [`store`]: The contract, the stores, union-mount merging and the sandbox
//! - [`paths`]: Path types and lexical normalization
//! - [`model`]: Data exchanged through the contract
//! - [`extensions`]: Extension allow-lists
//! - [`search`]: Glob and grep matching shared by the stores
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod config;
pub mod error;
pub mod extensions;
pub mod model;
pub mod paths;
pub mod search;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use api::{ContentApi, ResolvedContent};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use paths::{LogicalPath, ProvenanceUri, SafeRelativePath};
pub use store::ContentStore;
