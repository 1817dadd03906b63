//! Unified diff parsing, application, and statistics.
//!
//! The parser is intentionally lenient: it only recognizes `--- a/` + `+++ b/`
//! file headers and `@@ -o[,l] +o[,l] @@` hunk headers, and copies every other
//! line into the current hunk. The applier is line-based and cursor-driven;
//! it trusts the hunk bodies instead of matching context against the source.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+),?(\d+)? \+(\d+),?(\d+)? @@").expect("hunk regex should be valid")
});

/// One classified hunk body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Context(String),
    Add(String),
    Delete(String),
}

impl Op {
    /// Classify a raw hunk body line.
    ///
    /// Lines with an unknown prefix (including blank lines) become context that
    /// carries the whole line; oracle diffs routinely drop the leading space on
    /// unchanged lines. `\ No newline at end of file` markers yield `None`.
    pub fn from_body_line(line: &str) -> Option<Op> {
        if line.starts_with('\\') {
            return None;
        }
        let op = if let Some(rest) = line.strip_prefix(' ') {
            Op::Context(rest.to_string())
        } else if let Some(rest) = line.strip_prefix('-') {
            Op::Delete(rest.to_string())
        } else if let Some(rest) = line.strip_prefix('+') {
            Op::Add(rest.to_string())
        } else {
            Op::Context(line.to_string())
        };
        Some(op)
    }
}

/// A contiguous change region. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub ops: Vec<Op>,
}

impl Hunk {
    /// Render the `@@ -o,l +o,l @@` header for this hunk.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_len, self.new_start, self.new_len
        )
    }

    /// Count `(added, deleted)` lines.
    pub fn summary(&self) -> (usize, usize) {
        self.ops.iter().fold((0, 0), |(add, del), op| match op {
            Op::Add(_) => (add + 1, del),
            Op::Delete(_) => (add, del + 1),
            Op::Context(_) => (add, del),
        })
    }
}

/// Hunks for a single file, keyed by the `+++ b/<path>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<Hunk>,
}

/// Parsed diff: unique paths in file-header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDiff {
    files: Vec<FileDiff>,
}

impl ParsedDiff {
    pub fn files(&self) -> &[FileDiff] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn hunks(&self, path: &str) -> Option<&[Hunk]> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.hunks.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Index of the entry for `path`, creating it if missing.
    fn entry(&mut self, path: &str) -> usize {
        if let Some(idx) = self.files.iter().position(|f| f.path == path) {
            return idx;
        }
        self.files.push(FileDiff {
            path: path.to_string(),
            hunks: Vec::new(),
        });
        self.files.len() - 1
    }
}

/// Parse unified-diff text into per-file hunks.
pub fn parse_unified_diff(diff_text: &str) -> ParsedDiff {
    let lines: Vec<&str> = diff_text.lines().collect();
    let mut parsed = ParsedDiff::default();
    let mut current: Option<usize> = None;
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        if line.starts_with("--- a/") {
            if let Some(path) = lines.get(index + 1).and_then(|l| l.strip_prefix("+++ b/")) {
                current = Some(parsed.entry(path));
                index += 2;
                continue;
            }
        }

        if let (Some(file_idx), Some(caps)) = (current, HUNK_RE.captures(line)) {
            let number = |i: usize, default: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(default)
            };
            let mut hunk = Hunk {
                old_start: number(1, 0),
                old_len: number(2, 1),
                new_start: number(3, 0),
                new_len: number(4, 1),
                ops: Vec::new(),
            };
            index += 1;
            while index < lines.len()
                && !lines[index].starts_with("@@")
                && !lines[index].starts_with("--- a/")
            {
                hunk.ops.extend(Op::from_body_line(lines[index]));
                index += 1;
            }
            parsed.files[file_idx].hunks.push(hunk);
            continue;
        }

        index += 1;
    }

    parsed
}

/// Apply `hunks` (ascending, non-overlapping) to `original`.
///
/// Lines between hunks are copied verbatim. A hunk that starts before the
/// cursor (out of order or overlapping) or past the end of the file is
/// rejected instead of producing shuffled output. A trailing newline on the
/// original is preserved; text created from an empty original gets one.
pub fn apply_hunks(original: &str, hunks: &[Hunk]) -> Result<String, String> {
    let source: Vec<&str> = original.lines().collect();
    let mut output: Vec<&str> = Vec::with_capacity(source.len());
    let mut cursor = 1usize;

    for (idx, hunk) in hunks.iter().enumerate() {
        let start = hunk.old_start.max(1);
        if start < cursor {
            return Err(format!(
                "hunk {} ({}) overlaps or precedes line {} already consumed",
                idx + 1,
                hunk.header(),
                cursor - 1
            ));
        }
        if start > source.len() + 1 {
            return Err(format!(
                "hunk {} ({}) starts past end of file ({} lines)",
                idx + 1,
                hunk.header(),
                source.len()
            ));
        }

        while cursor < start {
            output.push(source[cursor - 1]);
            cursor += 1;
        }

        for op in &hunk.ops {
            match op {
                Op::Context(text) => {
                    output.push(text);
                    cursor += 1;
                }
                Op::Delete(_) => cursor += 1,
                Op::Add(text) => output.push(text),
            }
        }
    }

    while cursor <= source.len() {
        output.push(source[cursor - 1]);
        cursor += 1;
    }

    let mut text = output.join("\n");
    if (original.is_empty() || original.ends_with('\n')) && !text.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

/// Diff size used for budget checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub files_touched: usize,
    pub changed_lines: usize,
}

/// Count distinct `+++ b/` targets and `+`/`-` body lines (headers excluded).
pub fn diff_stats(diff_text: &str) -> DiffStats {
    let mut files: HashSet<&str> = HashSet::new();
    let mut changed_lines = 0;
    for line in diff_text.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            files.insert(path);
        } else if (line.starts_with('+') && !line.starts_with("+++"))
            || (line.starts_with('-') && !line.starts_with("---"))
        {
            changed_lines += 1;
        }
    }
    DiffStats {
        files_touched: files.len(),
        changed_lines,
    }
}
