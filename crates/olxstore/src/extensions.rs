//! Extension allow-lists.
//!
//! Every store consults these lists, so a file is "content" (or "media", or
//! greppable) the same way whether it lives on disk, in memory or remotely.
//!
//! | List | Used by |
//! |------|---------|
//! | [`CONTENT_EXTENSIONS`] | `list_files`, `load_xml_files_with_stats` |
//! | [`MEDIA_EXTENSIONS`] | `validate_asset_path` |
//! | [`GLOB_EXTENSIONS`] | `glob` (content + media) |
//! | [`GREP_EXTENSIONS`] | `grep` (content + code + plain text) |

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Markup, grammar and narrative-text formats.
pub const CONTENT_EXTENSIONS: &[&str] = &["olx", "xml", "md", "peg"];

pub const MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "mp3", "mp4", "webm", "ogg", "wav",
    "pdf",
];

const CODE_AND_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "json", "yaml", "yml", "js", "jsx", "ts", "tsx", "css", "html", "py", "csv",
];

pub static GLOB_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    CONTENT_EXTENSIONS
        .iter()
        .chain(MEDIA_EXTENSIONS)
        .copied()
        .collect()
});

pub static GREP_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    CONTENT_EXTENSIONS
        .iter()
        .chain(CODE_AND_TEXT_EXTENSIONS)
        .copied()
        .collect()
});

fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

fn has_extension_in<'a>(name: &str, mut list: impl Iterator<Item = &'a &'a str>) -> bool {
    match extension_of(name) {
        Some(ext) => list.any(|candidate| *candidate == ext),
        None => false,
    }
}

pub fn is_content_file(name: &str) -> bool {
    has_extension_in(name, CONTENT_EXTENSIONS.iter())
}

pub fn is_media_file(name: &str) -> bool {
    has_extension_in(name, MEDIA_EXTENSIONS.iter())
}

pub fn is_globbable_file(name: &str) -> bool {
    has_extension_in(name, GLOB_EXTENSIONS.iter())
}

pub fn is_greppable_file(name: &str) -> bool {
    has_extension_in(name, GREP_EXTENSIONS.iter())
}

/// Dotfiles and editor lock/swap artifacts (`#foo.olx#`, `foo.olx~`).
pub fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name.contains('~') || name.contains('#')
}

/// What kind of content a recognized file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Olx,
    Xml,
    Markdown,
    Peg,
}

impl ContentKind {
    pub fn from_path(path: &str) -> Option<Self> {
        match extension_of(path)?.as_str() {
            "olx" => Some(ContentKind::Olx),
            "xml" => Some(ContentKind::Xml),
            "md" => Some(ContentKind::Markdown),
            "peg" => Some(ContentKind::Peg),
            _ => None,
        }
    }
}
