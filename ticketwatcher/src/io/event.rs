//! GitHub webhook payloads consumed by the CLI.
//!
//! Only the fields triage needs are modelled; everything else in the payload
//! is ignored.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::core::types::Ticket;

#[derive(Debug, Clone, Deserialize)]
pub struct LabelRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
}

impl Issue {
    pub fn to_ticket(&self) -> Ticket {
        Ticket {
            number: self.number,
            title: self.title.clone(),
            body: self.body.clone().unwrap_or_default(),
            labels: self
                .labels
                .iter()
                .map(|label| label.name.clone())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

/// `issues` event: opened, reopened, labeled, ...
#[derive(Debug, Clone, Deserialize)]
pub struct IssueEvent {
    pub action: String,
    pub issue: Issue,
    /// Present on `labeled` / `unlabeled`.
    #[serde(default)]
    pub label: Option<LabelRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: Option<String>,
}

/// `issue_comment` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
}

/// Read and decode an event payload file.
pub fn load_event<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse event {}", path.display()))
}
