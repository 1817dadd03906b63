//! Source-host abstraction.
//!
//! The [`SourceHost`] trait decouples triage orchestration from the hosting
//! service (currently the GitHub REST API). Tests use an in-memory host that
//! records every write without touching the network.

use anyhow::Result;

/// Parameters for opening a draft change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub title: String,
    /// Branch carrying the patch.
    pub head: String,
    /// Branch the patch targets.
    pub base: String,
    pub body: String,
    pub draft: bool,
}

/// Identity of an opened change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedChangeRequest {
    pub url: String,
    pub number: u64,
}

/// Operations the triage pipeline needs from a source host.
///
/// `revision` arguments accept a branch name or a commit identifier.
pub trait SourceHost {
    fn default_branch(&self) -> Result<String>;

    /// Commit identifier at the tip of `branch`.
    fn head_revision(&self, branch: &str) -> Result<String>;

    /// Create `name` at `from_revision`. An existing branch is not an error.
    fn create_branch(&self, name: &str, from_revision: &str) -> Result<()>;

    /// File text at `revision`; `None` when the path is missing or a directory.
    fn read_file(&self, path: &str, revision: &str) -> Result<Option<String>>;

    fn file_exists(&self, path: &str, revision: &str) -> Result<bool>;

    /// Create or replace `path` on `branch` as one commit.
    fn write_file(&self, path: &str, text: &str, message: &str, branch: &str) -> Result<()>;

    fn open_change_request(&self, request: &ChangeRequest) -> Result<OpenedChangeRequest>;

    /// Comment on a ticket or change request (they share a number space).
    fn add_comment(&self, item: u64, text: &str) -> Result<()>;

    fn add_labels(&self, item: u64, labels: &[String]) -> Result<()>;
}
