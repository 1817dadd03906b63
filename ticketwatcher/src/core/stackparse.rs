//! Extraction of `(path, line)` hints from free-form ticket text.
//!
//! Three passes run in a fixed order over the full text:
//! 1. traceback frames: `File "<path>", line N`
//! 2. generic tokens: `<path>:N`
//! 3. explicit hints: `Target: <path>[:N]` at line start
//!
//! Results are repo-relative, policy-filtered, de-duplicated on
//! `(path, line or 0)`, and capped at `limit`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::path::{sanitize_path_token, to_repo_relative};
use crate::core::policy::PathPolicy;
use crate::core::types::Location;

/// Default cap on extracted locations.
pub const DEFAULT_LIMIT: usize = 5;

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File\s+"([^"]+)"\s*,\s*line\s+(\d+)\b"#).expect("frame regex should be valid")
});
static PATH_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s'",)\]]+):(\d+)\b"#).expect("path:line regex should be valid")
});
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Target:\s*(.+?)\s*$").expect("target regex should be valid")
});

/// Where to resolve absolute paths found in ticket text.
#[derive(Debug, Clone, Copy)]
pub struct RepoAnchor<'a> {
    pub root: &'a str,
    pub name: &'a str,
}

/// Return repo-relative locations mentioned in `text`, in discovery order.
pub fn parse_stack_text(
    text: &str,
    anchor: RepoAnchor<'_>,
    policy: &PathPolicy,
    limit: usize,
) -> Vec<Location> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<(String, Option<u32>)> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = FRAME_RE.captures(line) {
            candidates.push((caps[1].to_string(), caps[2].parse().ok()));
        }
    }

    for line in text.lines() {
        for caps in PATH_LINE_RE.captures_iter(line) {
            candidates.push((caps[1].to_string(), caps[2].parse().ok()));
        }
    }

    for caps in TARGET_RE.captures_iter(text) {
        candidates.push(split_target(&sanitize_path_token(&caps[1])));
    }

    let cap = limit.max(1);
    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut out = Vec::new();
    for (raw_path, line) in candidates {
        let path = to_repo_relative(&sanitize_path_token(&raw_path), anchor.root, anchor.name);
        if path.is_empty() || !policy.allowed(&path) {
            continue;
        }
        if !seen.insert((path.clone(), line.unwrap_or(0))) {
            continue;
        }
        out.push(Location::new(path, line));
        if out.len() >= cap {
            break;
        }
    }
    out
}

fn split_target(value: &str) -> (String, Option<u32>) {
    if let Some((path, tail)) = value.rsplit_once(':') {
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            return (path.to_string(), tail.parse().ok());
        }
    }
    (value.to_string(), None)
}
