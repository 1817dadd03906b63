//! Allow-list policy for repo-relative paths.
//!
//! An empty list, or one containing `""`, allows every non-empty path.
//! Directory entries end with `/`; entries whose last segment contains a `.`
//! are exact file allowances.

/// Normalized allow-list of path prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPolicy {
    allowed_prefixes: Vec<String>,
}

impl PathPolicy {
    /// Build a policy from already-normalized prefixes.
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Policy that allows every non-empty path.
    pub fn allow_all() -> Self {
        Self::new(vec![String::new()])
    }

    /// Parse a comma-separated allow-list string.
    ///
    /// Entries are trimmed and de-duplicated in first-seen order. An input with no
    /// surviving entries (empty, whitespace, or only commas) allows all paths.
    pub fn parse(raw: &str) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for part in raw.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let prefix = normalize_prefix(trimmed);
            if !normalized.contains(&prefix) {
                normalized.push(prefix);
            }
        }
        if normalized.is_empty() {
            return Self::allow_all();
        }
        Self::new(normalized)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.allowed_prefixes
    }

    pub fn allows_all(&self) -> bool {
        self.allowed_prefixes.is_empty() || self.allowed_prefixes.iter().any(|p| p.is_empty())
    }

    /// True if `path` may be read or modified under this policy.
    pub fn allowed(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if self.allows_all() {
            return true;
        }
        self.allowed_prefixes
            .iter()
            .any(|prefix| path == prefix.trim_end_matches('/') || path.starts_with(prefix.as_str()))
    }

    /// Render for prompts and comments: `*` when everything is allowed.
    pub fn describe(&self) -> String {
        if self.allows_all() {
            return "*".to_string();
        }
        self.allowed_prefixes.join(",")
    }
}

fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        return prefix.to_string();
    }
    let tail = prefix.rsplit('/').next().unwrap_or(prefix);
    if tail.contains('.') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}
