//! TicketWatcher configuration (TOML file plus environment overrides).
//!
//! The configuration is loaded once at startup and passed by reference into
//! the orchestrator; nothing in the pipeline reads the environment directly.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::policy::PathPolicy;

/// Runtime configuration.
///
/// Missing fields default to the values the GitHub Action ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TicketWatcherConfig {
    /// Labels that make a ticket eligible for automated triage.
    pub trigger_labels: Vec<String>,

    /// Branch name prefix; the ticket number is appended.
    pub branch_prefix: String,

    /// Draft PR title prefix; ` #<ticket>` is appended.
    pub pr_title_prefix: String,

    /// Comma-separated allow-list of repo-relative prefixes (empty = allow all).
    pub allowed_paths: String,

    /// Maximum number of files a proposed patch may touch.
    pub max_files: usize,

    /// Maximum number of added + removed lines in a proposed patch.
    pub max_lines: usize,

    /// Default context window (lines on each side of a hint).
    pub around_lines: usize,

    /// Ticket body characters included in the oracle prompt.
    pub body_char_budget: usize,

    /// Labels added to the ticket when a run needs human input.
    pub escalation_labels: Vec<String>,

    /// Base branch for patches; defaults to the repository default branch.
    pub base_branch: Option<String>,

    /// Local checkout root used to relativize absolute traceback paths.
    pub repo_root: String,

    /// Repository name used to strip CI checkout prefixes from paths.
    pub repo_name: String,

    /// Per-request timeout for host and oracle HTTP calls.
    pub http_timeout_secs: u64,

    pub github: GithubConfig,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// `owner/name`.
    pub repository: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            repository: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible API root (the `/chat/completions` suffix is appended).
    pub base_url: String,
    pub model: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Default for TicketWatcherConfig {
    fn default() -> Self {
        Self {
            trigger_labels: vec!["agent-fix".to_string(), "auto-pr".to_string()],
            branch_prefix: "agent-fix/".to_string(),
            pr_title_prefix: "agent: auto-fix for issue".to_string(),
            allowed_paths: "src/,app/".to_string(),
            max_files: 4,
            max_lines: 200,
            around_lines: 60,
            body_char_budget: 6_000,
            escalation_labels: Vec::new(),
            base_branch: None,
            repo_root: ".".to_string(),
            repo_name: String::new(),
            http_timeout_secs: 60,
            github: GithubConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl TicketWatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(anyhow!("max_files must be > 0"));
        }
        if self.max_lines == 0 {
            return Err(anyhow!("max_lines must be > 0"));
        }
        if self.around_lines < 10 {
            return Err(anyhow!("around_lines must be >= 10"));
        }
        if self.body_char_budget == 0 {
            return Err(anyhow!("body_char_budget must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.branch_prefix.trim().is_empty() {
            return Err(anyhow!("branch_prefix must be non-empty"));
        }
        Ok(())
    }

    /// Parsed allow-list policy.
    pub fn policy(&self) -> PathPolicy {
        PathPolicy::parse(&self.allowed_paths)
    }

    /// Overlay environment variables onto the file configuration.
    ///
    /// `lookup` abstracts `std::env::var` so callers and tests can inject values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TICKETWATCHER_TRIGGER_LABELS") {
            self.trigger_labels = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("TICKETWATCHER_BRANCH_PREFIX") {
            self.branch_prefix = raw;
        }
        if let Some(raw) = lookup("TICKETWATCHER_PR_TITLE_PREFIX") {
            self.pr_title_prefix = raw;
        }
        if let Some(raw) = lookup("TICKETWATCHER_BASE_BRANCH").filter(|s| !s.trim().is_empty()) {
            self.base_branch = Some(raw.trim().to_string());
        }
        if let Some(raw) = lookup("TICKETWATCHER_MODEL") {
            self.oracle.model = raw;
        }
        if let Some(raw) = lookup("OPENAI_BASE_URL") {
            self.oracle.base_url = raw;
        }
        if let Some(raw) = lookup("ALLOWED_PATHS") {
            self.allowed_paths = raw;
        }
        if let Some(raw) = lookup("MAX_FILES") {
            self.max_files = parse_number("MAX_FILES", &raw)?;
        }
        if let Some(raw) = lookup("MAX_LINES") {
            self.max_lines = parse_number("MAX_LINES", &raw)?;
        }
        if let Some(raw) = lookup("DEFAULT_AROUND_LINES") {
            self.around_lines = parse_number("DEFAULT_AROUND_LINES", &raw)?;
        }
        if let Some(raw) = lookup("GITHUB_API") {
            self.github.api_url = raw;
        }
        if let Some(raw) = lookup("GITHUB_REPOSITORY").or_else(|| lookup("GITHUB_REPO")) {
            self.github.repository = raw;
        }
        if let Some(raw) = lookup("GITHUB_WORKSPACE") {
            self.repo_root = raw;
        }
        if self.repo_name.is_empty() {
            self.repo_name = resolve_repo_name(&self.github.repository, &self.repo_root);
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .with_context(|| format!("parse {key}={raw:?} as a non-negative integer"))
}

/// `owner/name` → `name`, else the last component of the checkout root.
fn resolve_repo_name(repository: &str, repo_root: &str) -> String {
    if let Some((_, name)) = repository.split_once('/') {
        return name.to_string();
    }
    if !repository.is_empty() {
        return repository.to_string();
    }
    Path::new(repo_root)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse the TOML file without validating; a missing file yields defaults.
fn read_config(path: &Path) -> Result<TicketWatcherConfig> {
    if !path.exists() {
        return Ok(TicketWatcherConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TicketWatcherConfig::default()`.
pub fn load_config(path: &Path) -> Result<TicketWatcherConfig> {
    let cfg = read_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from `path`, overlay `lookup`, then validate the result.
///
/// Validation runs once, after the overlay, so the environment can repair a
/// file value.
pub fn load_config_with_lookup<F>(path: &Path, lookup: F) -> Result<TicketWatcherConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = read_config(path)?;
    cfg.apply_env(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from `path` and overlay the process environment.
pub fn load_config_with_env(path: &Path) -> Result<TicketWatcherConfig> {
    load_config_with_lookup(path, |key| std::env::var(key).ok())
}
