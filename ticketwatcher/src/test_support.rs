//! Test doubles for the source host and the oracle.
//!
//! Both record every call so tests can assert on writes, comments, and the
//! prompts sent to the oracle without touching the network.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};

use crate::io::host::{ChangeRequest, OpenedChangeRequest, SourceHost};
use crate::io::oracle::Oracle;

const REVISION_SUFFIX: &str = "@head";

/// One `write_file` call as seen by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub path: String,
    pub text: String,
    pub message: String,
    pub branch: String,
}

/// In-memory source host keyed by branch.
///
/// Revisions are `<branch>@head`; plain branch names are accepted too.
pub struct MemoryHost {
    default_branch: String,
    files: RefCell<BTreeMap<String, BTreeMap<String, String>>>,
    branches_created: RefCell<Vec<(String, String)>>,
    writes: RefCell<Vec<WriteRecord>>,
    change_requests: RefCell<Vec<ChangeRequest>>,
    comments: RefCell<Vec<(u64, String)>>,
    labels: RefCell<Vec<(u64, Vec<String>)>>,
    fail_reads: Cell<bool>,
    fail_write_at: Cell<Option<usize>>,
    fail_comments_on: RefCell<Vec<u64>>,
    next_change_number: Cell<u64>,
}

impl MemoryHost {
    pub fn new(default_branch: &str) -> Self {
        let mut files = BTreeMap::new();
        files.insert(default_branch.to_string(), BTreeMap::new());
        Self {
            default_branch: default_branch.to_string(),
            files: RefCell::new(files),
            branches_created: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            change_requests: RefCell::new(Vec::new()),
            comments: RefCell::new(Vec::new()),
            labels: RefCell::new(Vec::new()),
            fail_reads: Cell::new(false),
            fail_write_at: Cell::new(None),
            fail_comments_on: RefCell::new(Vec::new()),
            next_change_number: Cell::new(100),
        }
    }

    pub fn with_file(self, branch: &str, path: &str, text: &str) -> Self {
        self.files
            .borrow_mut()
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), text.to_string());
        self
    }

    /// Make every read and existence check fail.
    pub fn fail_reads(&self) {
        self.fail_reads.set(true);
    }

    /// Make the `index`-th (0-based) `write_file` call fail.
    pub fn fail_write_at(&self, index: usize) {
        self.fail_write_at.set(Some(index));
    }

    /// Make comments on `item` fail.
    pub fn fail_comments_on(&self, item: u64) {
        self.fail_comments_on.borrow_mut().push(item);
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.files
            .borrow()
            .get(branch)
            .and_then(|files| files.get(path).cloned())
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.borrow().clone()
    }

    pub fn branches_created(&self) -> Vec<(String, String)> {
        self.branches_created.borrow().clone()
    }

    pub fn change_requests(&self) -> Vec<ChangeRequest> {
        self.change_requests.borrow().clone()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.comments.borrow().clone()
    }

    pub fn comments_on(&self, item: u64) -> Vec<String> {
        self.comments
            .borrow()
            .iter()
            .filter(|(id, _)| *id == item)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn labels(&self) -> Vec<(u64, Vec<String>)> {
        self.labels.borrow().clone()
    }

    /// True when nothing was written, branched, opened, commented, or labeled.
    pub fn untouched(&self) -> bool {
        self.writes.borrow().is_empty()
            && self.branches_created.borrow().is_empty()
            && self.change_requests.borrow().is_empty()
            && self.comments.borrow().is_empty()
            && self.labels.borrow().is_empty()
    }

    fn branch_of(revision: &str) -> &str {
        revision.strip_suffix(REVISION_SUFFIX).unwrap_or(revision)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.get() {
            return Err(anyhow!("memory host: reads disabled"));
        }
        Ok(())
    }
}

impl SourceHost for MemoryHost {
    fn default_branch(&self) -> Result<String> {
        Ok(self.default_branch.clone())
    }

    fn head_revision(&self, branch: &str) -> Result<String> {
        if !self.files.borrow().contains_key(branch) {
            return Err(anyhow!("memory host: unknown branch {branch}"));
        }
        Ok(format!("{branch}{REVISION_SUFFIX}"))
    }

    fn create_branch(&self, name: &str, from_revision: &str) -> Result<()> {
        let source = Self::branch_of(from_revision);
        let mut files = self.files.borrow_mut();
        if files.contains_key(name) {
            return Ok(());
        }
        let snapshot = files
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow!("memory host: unknown revision {from_revision}"))?;
        files.insert(name.to_string(), snapshot);
        self.branches_created
            .borrow_mut()
            .push((name.to_string(), from_revision.to_string()));
        Ok(())
    }

    fn read_file(&self, path: &str, revision: &str) -> Result<Option<String>> {
        self.check_reads()?;
        let files = self.files.borrow();
        let branch = files
            .get(Self::branch_of(revision))
            .ok_or_else(|| anyhow!("memory host: unknown revision {revision}"))?;
        Ok(branch.get(path).cloned())
    }

    fn file_exists(&self, path: &str, revision: &str) -> Result<bool> {
        self.check_reads()?;
        Ok(self
            .files
            .borrow()
            .get(Self::branch_of(revision))
            .is_some_and(|files| files.contains_key(path)))
    }

    fn write_file(&self, path: &str, text: &str, message: &str, branch: &str) -> Result<()> {
        let index = self.writes.borrow().len();
        if self.fail_write_at.get() == Some(index) {
            return Err(anyhow!("memory host: write of {path} rejected"));
        }
        self.files
            .borrow_mut()
            .get_mut(branch)
            .ok_or_else(|| anyhow!("memory host: unknown branch {branch}"))?
            .insert(path.to_string(), text.to_string());
        self.writes.borrow_mut().push(WriteRecord {
            path: path.to_string(),
            text: text.to_string(),
            message: message.to_string(),
            branch: branch.to_string(),
        });
        Ok(())
    }

    fn open_change_request(&self, request: &ChangeRequest) -> Result<OpenedChangeRequest> {
        let number = self.next_change_number.get();
        self.next_change_number.set(number + 1);
        self.change_requests.borrow_mut().push(request.clone());
        Ok(OpenedChangeRequest {
            url: format!("https://example.test/pull/{number}"),
            number,
        })
    }

    fn add_comment(&self, item: u64, text: &str) -> Result<()> {
        if self.fail_comments_on.borrow().contains(&item) {
            return Err(anyhow!("memory host: comments on #{item} rejected"));
        }
        self.comments.borrow_mut().push((item, text.to_string()));
        Ok(())
    }

    fn add_labels(&self, item: u64, labels: &[String]) -> Result<()> {
        self.labels.borrow_mut().push((item, labels.to_vec()));
        Ok(())
    }
}

/// Prompt pair sent to a [`ScriptedOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPrompt {
    pub system: String,
    pub user: String,
}

/// Oracle that replays queued replies in order.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<RecordedPrompt>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    /// Error if any queued reply was never consumed.
    pub fn assert_drained(&self) -> Result<()> {
        let left = self.replies.borrow().len();
        if left > 0 {
            return Err(anyhow!("scripted oracle has {left} unused replies"));
        }
        Ok(())
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(RecordedPrompt {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted oracle has no reply left"))
    }
}
