//! Line-window arithmetic for snippet retrieval.

use regex::Regex;

use crate::core::types::Snippet;

/// Compute the 1-based inclusive window for a file with `total` lines.
///
/// A missing or out-of-range center yields a head slice of `2 * around`
/// lines so a bare filename hint still produces useful context.
pub fn line_window(total: usize, center: Option<usize>, around: usize) -> Option<(usize, usize)> {
    if total == 0 {
        return None;
    }
    let (start, end) = match center {
        Some(c) if (1..=total).contains(&c) => centered(total, c, around),
        _ => (1, total.min(around.saturating_mul(2))),
    };
    (start <= end).then_some((start, end))
}

/// Window centered on a known line; no head-slice fallback.
pub fn centered(total: usize, center: usize, around: usize) -> (usize, usize) {
    let start = center.saturating_sub(around).max(1);
    let end = total.min(center.saturating_add(around));
    (start, end)
}

/// Locate `symbol`: first definition line (`def`/`class`), else first substring hit.
pub fn find_symbol_line(lines: &[&str], symbol: &str) -> Option<usize> {
    if symbol.is_empty() {
        return None;
    }
    let definition = Regex::new(&format!(r"^\s*(def|class)\s+{}\b", regex::escape(symbol))).ok();
    if let Some(re) = definition {
        if let Some(idx) = lines.iter().position(|line| re.is_match(line)) {
            return Some(idx + 1);
        }
    }
    lines
        .iter()
        .position(|line| line.contains(symbol))
        .map(|idx| idx + 1)
}

/// Cut `[start, end]` (1-based inclusive) out of `lines`.
pub fn slice(path: &str, lines: &[&str], start: usize, end: usize) -> Snippet {
    let code = lines[start - 1..end].join("\n");
    Snippet {
        path: path.to_string(),
        start_line: start,
        end_line: end,
        code,
    }
}
