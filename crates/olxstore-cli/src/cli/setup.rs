use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "olxstore",
    bin_name = "olxstore",
    version,
    disable_help_subcommand = true,
    about = "Read, write and search course content across layered stores",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub stack: StackArgs,

    /// Print results as JSON
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct StackArgs {
    /// Content root; repeat to layer roots, first has the highest priority
    #[arg(long = "root", short = 'r', global = true, value_name = "DIR", help_heading = "Stores")]
    pub roots: Vec<PathBuf>,

    /// Base URL of a remote store, layered below the local roots
    #[arg(long, global = true, value_name = "URL", help_heading = "Stores")]
    pub remote: Option<String>,

    /// Namespace for the remote store
    #[arg(long, global = true, value_name = "NAME", help_heading = "Stores")]
    pub namespace: Option<String>,

    /// Config file (default: olxstore.toml in the platform config directory)
    #[arg(long, global = true, value_name = "FILE", help_heading = "Stores")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a file
    #[command(alias = "cat", display_order = 1)]
    Read {
        path: String,
    },

    /// Write stdin to a file
    #[command(display_order = 2)]
    Write {
        path: String,

        /// Modification time last seen; the write fails if the file changed since
        #[arg(long, value_name = "RFC3339")]
        mtime: Option<DateTime<Utc>>,

        /// Write even if the file changed since --mtime
        #[arg(long, short)]
        force: bool,
    },

    /// Delete a file
    #[command(alias = "delete", display_order = 3)]
    Rm {
        path: String,
    },

    /// Rename a file
    #[command(alias = "rename", display_order = 4)]
    Mv {
        from: String,
        to: String,
    },

    /// List content files as a tree
    #[command(alias = "list", display_order = 10)]
    Ls {
        /// Subtree to list
        base: Option<String>,

        /// Maximum depth below the base
        #[arg(long, short)]
        depth: Option<usize>,
    },

    /// Scan content files and report what changed since the given snapshot
    #[command(display_order = 11)]
    Scan {
        /// Snapshot written by a previous `scan --save`
        #[arg(long, value_name = "FILE")]
        previous: Option<PathBuf>,

        /// Write this scan's result for the next `scan --previous`
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// Find files by glob pattern
    #[command(display_order = 20)]
    Glob {
        pattern: String,

        /// Directory the pattern is relative to
        #[arg(long, short)]
        base: Option<String>,
    },

    /// Search file contents by regular expression
    #[command(alias = "search", display_order = 21)]
    Grep {
        pattern: String,

        /// Directory to search under
        #[arg(long, short)]
        base: Option<String>,

        /// Glob restricting which files are searched (e.g. "*.olx")
        #[arg(long)]
        include: Option<String>,

        /// Maximum number of matches
        #[arg(long, short)]
        limit: Option<usize>,

        /// Case-insensitive match
        #[arg(long, short = 'i')]
        ignore_case: bool,
    },

    /// Resolve a reference written inside a file
    #[command(display_order = 30)]
    Resolve {
        /// File containing the reference
        file: String,

        /// Reference as written, e.g. "../media/fig.png"
        reference: String,

        /// Also read the target
        #[arg(long)]
        read: bool,
    },

    /// Show which store owns a file
    #[command(display_order = 31)]
    Provenance {
        path: String,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
