//! # Rendering Module
//!
//! Plain-text output for the CLI. Functions here build strings from library
//! types; handlers print them. JSON output bypasses this module entirely and
//! serializes the library types directly.
//!
//! Styling goes through `console`, which drops colors automatically when
//! stdout is not a terminal, so piped output stays clean.

use anyhow::Result;
use console::Style;
use olxstore::model::{DirEntry, FileRecord, GrepMatch, ScanResult, TreeEntry};
use olxstore::ProvenanceUri;
use std::collections::BTreeMap;
use std::fmt::Write;

const INDENT: &str = "  ";

pub fn message(json: bool, action: &str, subject: &str) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "action": action, "path": subject }))?
        );
    } else {
        println!("{} {}", Style::new().green().apply_to(action), subject);
    }
    Ok(())
}

/// Directory tree, directories first-class and suffixed with `/`.
pub fn tree(root: &DirEntry) -> String {
    let mut out = String::new();
    if !root.path.is_root() {
        let _ = writeln!(out, "{}/", Style::new().bold().apply_to(&root.path));
    }
    write_children(&mut out, root, 0);
    out
}

fn write_children(out: &mut String, dir: &DirEntry, depth: usize) {
    let dir_style = Style::new().blue().bold();
    for (name, child) in &dir.children {
        let indent = INDENT.repeat(depth);
        match child {
            TreeEntry::Directory(sub) => {
                let _ = writeln!(out, "{indent}{}", dir_style.apply_to(format!("{name}/")));
                write_children(out, sub, depth + 1);
            }
            TreeEntry::File(_) => {
                let _ = writeln!(out, "{indent}{name}");
            }
        }
    }
}

fn write_bucket(out: &mut String, label: &str, style: Style, bucket: &BTreeMap<ProvenanceUri, FileRecord>) {
    if bucket.is_empty() {
        return;
    }
    let _ = writeln!(out, "{} ({})", style.apply_to(label), bucket.len());
    for record in bucket.values() {
        let _ = writeln!(out, "{INDENT}{}", record.path);
    }
}

pub fn scan(result: &ScanResult) -> String {
    let mut out = String::new();
    write_bucket(&mut out, "added", Style::new().green(), &result.added);
    write_bucket(&mut out, "changed", Style::new().yellow(), &result.changed);
    write_bucket(&mut out, "deleted", Style::new().red(), &result.deleted);
    let _ = writeln!(
        out,
        "{} files, {} unchanged",
        result.len() - result.deleted.len(),
        result.unchanged.len()
    );
    out
}

/// `path:line: content`, one match per line.
pub fn grep(matches: &[GrepMatch]) -> String {
    let path_style = Style::new().magenta();
    let line_style = Style::new().green();
    let mut out = String::new();
    for m in matches {
        let _ = writeln!(
            out,
            "{}:{}: {}",
            path_style.apply_to(&m.path),
            line_style.apply_to(m.line),
            m.content
        );
    }
    out
}
