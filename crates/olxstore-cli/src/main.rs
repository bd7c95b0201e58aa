//! # olxstore CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, and this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (src/cli/)                                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Store assembly + dispatch (commands.rs)                  │
//! │  - Terminal and JSON output (render.rs)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  olxstore::ContentApi over a LayeredStore                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from the API inward is UI agnostic. The CLI owns argument
//! parsing, logging setup, stdin/stdout and exit codes.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
