//! Helpers for turning raw path tokens into repo-relative paths.

/// Strip surrounding quotes/backticks and trailing punctuation from a token.
pub fn sanitize_path_token(token: &str) -> String {
    let trimmed = token.trim().trim_matches(|c| matches!(c, '`' | '"' | '\''));
    trimmed
        .trim_end_matches(|c: char| matches!(c, '\'' | '"' | ',' | ')' | ']' | '>') || c.is_whitespace())
        .to_string()
}

/// Convert a raw (possibly absolute) path to repo-relative form.
///
/// Keeps the suffix after a `/<repo_name>/` segment when present, otherwise
/// strips `repo_root` from absolute paths under it. Returns an empty string for
/// paths that cannot be expressed inside the repository.
pub fn to_repo_relative(path: &str, repo_root: &str, repo_name: &str) -> String {
    let mut cleaned = path.trim().replace('\\', "/");
    if cleaned.is_empty() {
        return String::new();
    }

    let repo_token = format!("/{repo_name}/");
    if !repo_name.is_empty() {
        if let Some((_, rest)) = cleaned.split_once(&repo_token) {
            cleaned = rest.to_string();
        }
    }

    let root = repo_root.replace('\\', "/");
    let root = root.trim_end_matches('/');
    if !root.is_empty() && cleaned.starts_with('/') {
        if let Some(rest) = cleaned.strip_prefix(root) {
            if rest.starts_with('/') {
                cleaned = rest.to_string();
            }
        }
    }

    let mut rel = cleaned.as_str();
    loop {
        if let Some(rest) = rel.strip_prefix("./") {
            rel = rest;
        } else if let Some(rest) = rel.strip_prefix('/') {
            rel = rest;
        } else {
            break;
        }
    }

    if rel.split('/').any(|segment| segment == "..") {
        return String::new();
    }
    rel.to_string()
}
