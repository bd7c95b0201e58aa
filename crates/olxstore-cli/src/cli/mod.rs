//! # CLI Behavior
//!
//! One possible client of olxstore. The CLI is the only place that knows about
//! terminal I/O, exit codes and output formatting.
//!
//! ## Store Stack
//!
//! Every invocation assembles a layered store:
//!
//! 1. One local store per `--root` (first flag = highest priority, and the
//!    only writable member). Without `--root`, `base_dir` from the config.
//! 2. A remote store when `--remote` (or `remote_url` in the config) is set.
//!
//! Configuration comes from `--config`, else `olxstore.toml` in the platform
//! config directory, else defaults.
//!
//! ## Output
//!
//! Plain text by default. `--json` prints the library's own serde shapes, so
//! scripts see exactly what the API returns.
//!
//! ## Module Structure
//!
//! - `setup`: Argument parsing via clap
//! - `commands`: Store assembly and per-command handlers
//! - `render`: Text output

mod commands;
mod render;
pub mod setup;

pub use commands::run;
