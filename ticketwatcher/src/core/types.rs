//! Shared deterministic types for the triage core.
//!
//! These types define stable contracts between core components. They are
//! created fresh per ticket run and never persisted.

use serde::{Deserialize, Serialize};

/// A file/line hint extracted from ticket text.
///
/// `path` is repo-relative and never empty; `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: String,
    pub line: Option<u32>,
}

impl Location {
    pub fn new(path: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

/// A bounded excerpt of a file at some revision (1-based inclusive bounds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code: String,
}

/// Oracle request for additional context.
///
/// When both `symbol` and `line` are present, `symbol` wins during fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Need {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default)]
    pub around_lines: u32,
}

/// Classified oracle response.
///
/// Exactly one variant is active; unclassifiable responses are normalized to
/// [`AgentResult::RequestContext`] with no needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentResult {
    RequestContext {
        #[serde(default)]
        needs: Vec<Need>,
        #[serde(default)]
        reason: String,
    },
    ProposePatch {
        diff: String,
        #[serde(default)]
        files_touched: Vec<String>,
        #[serde(default)]
        estimated_changed_lines: u32,
        #[serde(default)]
        notes: String,
    },
}

impl AgentResult {
    /// Safe fallback used whenever oracle output cannot be classified.
    pub fn degraded(reason: impl Into<String>) -> Self {
        AgentResult::RequestContext {
            needs: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            AgentResult::RequestContext { .. } => "request_context",
            AgentResult::ProposePatch { .. } => "propose_patch",
        }
    }
}

/// Minimal ticket data the orchestrator works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}
