//! Glob and grep matching shared by every store.
//!
//! Stores differ in how they enumerate files; what counts as a match does not.
//! A [`GlobQuery`] or [`GrepQuery`] is compiled once per call and then fed
//! candidate paths (and, for grep, file contents).

use crate::error::{Result, StoreError};
use crate::extensions::{is_globbable_file, is_greppable_file};
use crate::model::{GrepMatch, GrepOptions};
use crate::paths::SafeRelativePath;
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Path of `path` relative to `base`, or `None` when it lies outside.
fn relative_to<'a>(path: &'a SafeRelativePath, base: &SafeRelativePath) -> Option<&'a str> {
    if !path.starts_with(base) {
        return None;
    }
    if base.is_root() {
        return Some(path.as_str());
    }
    Some(
        path.as_str()[base.as_str().len()..].trim_start_matches('/'),
    )
}

pub struct GlobQuery {
    base: SafeRelativePath,
    matcher: GlobMatcher,
}

impl GlobQuery {
    pub fn new(pattern: &str, base: Option<&SafeRelativePath>) -> Result<Self> {
        Ok(Self {
            base: base.cloned().unwrap_or_else(SafeRelativePath::root),
            matcher: compile_glob(pattern)?,
        })
    }

    pub fn base(&self) -> &SafeRelativePath {
        &self.base
    }

    /// `pattern` is evaluated relative to the base path; the extension
    /// allow-list applies on top of it.
    pub fn matches(&self, path: &SafeRelativePath) -> bool {
        if !is_globbable_file(path.as_str()) {
            return false;
        }
        match relative_to(path, &self.base) {
            Some(rel) if !rel.is_empty() => self.matcher.is_match(rel),
            _ => false,
        }
    }
}

pub struct GrepQuery {
    base: SafeRelativePath,
    regex: Regex,
    include: Option<(GlobMatcher, bool)>,
    limit: usize,
}

impl GrepQuery {
    pub fn new(pattern: &str, options: &GrepOptions) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .map_err(|e| StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        // An include pattern without a separator applies to the file name only.
        let include = match &options.include {
            Some(glob) => Some((compile_glob(glob)?, glob.contains('/'))),
            None => None,
        };

        Ok(Self {
            base: options
                .base_path
                .clone()
                .unwrap_or_else(SafeRelativePath::root),
            regex,
            include,
            limit: options.limit,
        })
    }

    pub fn base(&self) -> &SafeRelativePath {
        &self.base
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn accepts(&self, path: &SafeRelativePath) -> bool {
        if !is_greppable_file(path.as_str()) {
            return false;
        }
        let Some(rel) = relative_to(path, &self.base) else {
            return false;
        };
        match &self.include {
            Some((matcher, true)) => matcher.is_match(rel),
            Some((matcher, false)) => matcher.is_match(path.file_name()),
            None => true,
        }
    }

    /// Append matching lines of `content` to `out`. Returns `true` once the
    /// limit is reached.
    pub fn scan(&self, path: &SafeRelativePath, content: &str, out: &mut Vec<GrepMatch>) -> bool {
        if out.len() >= self.limit {
            return true;
        }
        for (idx, line) in content.lines().enumerate() {
            if self.regex.is_match(line) {
                out.push(GrepMatch {
                    path: path.clone(),
                    line: idx + 1,
                    content: line.trim().to_string(),
                });
                if out.len() >= self.limit {
                    return true;
                }
            }
        }
        false
    }
}

/// Order by path then line, drop duplicates (same path and line), cap at `limit`.
pub fn finalize_grep(mut matches: Vec<GrepMatch>, limit: usize) -> Vec<GrepMatch> {
    matches.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
    matches.dedup_by(|a, b| a.path == b.path && a.line == b.line);
    matches.truncate(limit);
    matches
}

pub fn finalize_glob(mut paths: Vec<SafeRelativePath>) -> Vec<SafeRelativePath> {
    paths.sort();
    paths.dedup();
    paths
}
