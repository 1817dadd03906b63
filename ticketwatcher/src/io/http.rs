//! Shared blocking HTTP helpers for the host and oracle adapters.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, Response};

/// Longest API error body echoed into error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

/// Build a client with a per-request timeout and a stable user agent.
pub fn client(timeout: Duration, headers: reqwest::header::HeaderMap) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("ticketwatcher/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("build HTTP client")
}

/// Pass successful responses through; turn anything else into an error.
pub fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(anyhow!(
        "{what} failed: HTTP {status}: {}",
        sanitize_error_body(&body)
    ))
}

/// Truncate an API error body and redact anything that looks like a credential.
pub fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &["bearer", "ghp_", "gho_", "ghs_", "github_pat_", "sk-"];

    let trimmed = body.trim();
    let truncated = match trimmed.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((cut, _)) => format!("{}... (truncated)", &trimmed[..cut]),
        None => trimmed.to_string(),
    };
    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted)".to_string();
    }
    truncated
}
