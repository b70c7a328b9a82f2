//! Structural checks for Netscape-format cookie files

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

const ACCEPTED_HEADERS: &[&str] = &["# Netscape HTTP Cookie File", "# HTTP Cookie File"];

/// `#HttpOnly_` prefixes a real cookie line, not a comment
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieFileIssue {
    #[error("file is empty")]
    Empty,

    #[error("missing Netscape cookie header")]
    MissingHeader,

    #[error("duplicate cookie line: {0}")]
    DuplicateLine(String),

    #[error("unreadable: {0}")]
    Unreadable(String),
}

/// Whether `path` holds a usable cookie file
pub fn validate(path: &Path) -> bool {
    check_file(path).is_ok()
}

pub fn check_file(path: &Path) -> Result<(), CookieFileIssue> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CookieFileIssue::Unreadable(e.to_string()))?;
    check_content(&content)
}

/// A file passes when it is non-empty, opens with a cookie-file header and has
/// no repeated content lines (a sign of a cloned or concatenated export)
pub fn check_content(content: &str) -> Result<(), CookieFileIssue> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let Some(first) = lines.next() else {
        return Err(CookieFileIssue::Empty);
    };
    if !ACCEPTED_HEADERS.iter().any(|h| first.starts_with(h)) {
        return Err(CookieFileIssue::MissingHeader);
    }

    let mut seen = HashSet::new();
    for line in lines {
        if line.starts_with('#') && !line.starts_with(HTTP_ONLY_PREFIX) {
            continue;
        }
        if !seen.insert(line) {
            return Err(CookieFileIssue::DuplicateLine(line.to_string()));
        }
    }

    Ok(())
}
