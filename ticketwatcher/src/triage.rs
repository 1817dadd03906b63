//! Ticket triage orchestration.
//!
//! Wires stack parsing, snippet retrieval, negotiation, budget checks, and
//! diff application into one run per ticket event:
//!
//! ```text
//! Idle -> Triggered -> GatheringContext -> Negotiating -> Validating -> Applying -> Completed
//! ```
//!
//! Every run that does not reach `Completed` posts exactly one explanatory
//! comment on the ticket. Ignored events touch nothing.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::agents::negotiator::{Negotiator, NegotiatorConfig};
use crate::core::budget::{BudgetCheck, check_budget};
use crate::core::diff::{DiffStats, apply_hunks, diff_stats, parse_unified_diff};
use crate::core::path::to_repo_relative;
use crate::core::policy::PathPolicy;
use crate::core::stackparse::{DEFAULT_LIMIT, RepoAnchor, parse_stack_text};
use crate::core::state::{StateTrail, TriageState};
use crate::core::trigger::{is_comment_trigger, merge_comment, should_trigger};
use crate::core::types::{AgentResult, Snippet, Ticket};
use crate::io::config::TicketWatcherConfig;
use crate::io::event::{IssueCommentEvent, IssueEvent};
use crate::io::host::{ChangeRequest, SourceHost};
use crate::io::oracle::Oracle;
use crate::io::snippets::SnippetFetcher;

pub const NEED_CONTEXT_COMMENT: &str = "⚠️ I need more context to propose a safe fix. \
Please include a traceback (`File \"src/...\", line N`) or add `Target: <path.py>`.";

/// Longest ticket title carried into commit messages.
const COMMIT_TITLE_CHARS: usize = 72;

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageOutcome {
    pub state: TriageState,
    /// Present iff `state` is `Completed`.
    pub pr_url: Option<String>,
    pub trail: Vec<TriageState>,
}

impl TriageOutcome {
    fn ignored() -> Self {
        Self {
            state: TriageState::Idle,
            pr_url: None,
            trail: vec![TriageState::Idle],
        }
    }

    /// True when the event was not relevant and nothing happened.
    pub fn is_ignored(&self) -> bool {
        self.state == TriageState::Idle
    }
}

/// Per-run progress.
struct Run<'t> {
    ticket: &'t Ticket,
    trail: StateTrail,
}

impl Run<'_> {
    fn advance(&mut self, to: TriageState) -> Result<()> {
        self.trail.advance(to).map_err(|err| anyhow!(err))?;
        info!(ticket = self.ticket.number, state = to.as_str(), "triage state");
        Ok(())
    }

    fn finish(self, pr_url: Option<String>) -> TriageOutcome {
        TriageOutcome {
            state: self.trail.current(),
            pr_url,
            trail: self.trail.states().to_vec(),
        }
    }
}

/// A patch that parsed, passed policy, and applied cleanly in memory.
struct PreparedPatch {
    files: Vec<(String, String)>,
    stats: DiffStats,
    notes: String,
}

/// Orchestrator bound to one host, one oracle, and one configuration.
pub struct Triage<'a, H: SourceHost, O: Oracle> {
    host: &'a H,
    oracle: &'a O,
    config: &'a TicketWatcherConfig,
    policy: PathPolicy,
}

impl<'a, H: SourceHost, O: Oracle> Triage<'a, H, O> {
    pub fn new(host: &'a H, oracle: &'a O, config: &'a TicketWatcherConfig) -> Self {
        Self {
            host,
            oracle,
            config,
            policy: config.policy(),
        }
    }

    /// Handle an `issues` event.
    #[instrument(skip_all, fields(ticket = event.issue.number, action = %event.action))]
    pub fn process_ticket_opened(&self, event: &IssueEvent) -> Result<TriageOutcome> {
        let ticket = event.issue.to_ticket();
        let added = event.label.as_ref().map(|label| label.name.as_str());
        if !should_trigger(
            &event.action,
            added,
            &ticket.labels,
            &self.config.trigger_labels,
        ) {
            info!("event not relevant; ignoring");
            return Ok(TriageOutcome::ignored());
        }
        self.run(&ticket)
    }

    /// Handle an `issue_comment` event carrying the trigger phrase.
    #[instrument(skip_all, fields(ticket = event.issue.number, action = %event.action))]
    pub fn process_ticket_comment_added(&self, event: &IssueCommentEvent) -> Result<TriageOutcome> {
        let comment = event.comment.body.as_deref().unwrap_or_default();
        if !is_comment_trigger(&event.action, comment) {
            info!("comment is not a trigger; ignoring");
            return Ok(TriageOutcome::ignored());
        }
        let mut ticket = event.issue.to_ticket();
        ticket.body = merge_comment(&ticket.body, comment);
        self.run(&ticket)
    }

    fn run(&self, ticket: &Ticket) -> Result<TriageOutcome> {
        let mut run = Run {
            ticket,
            trail: StateTrail::default(),
        };
        run.advance(TriageState::Triggered)?;
        run.advance(TriageState::GatheringContext)?;

        let base = match self.base_branch() {
            Ok(base) => base,
            Err(err) => {
                return self.fail(
                    run,
                    format!("❌ Could not resolve the base branch: {err:#}"),
                );
            }
        };
        let fetcher = SnippetFetcher::new(self.host, &self.policy);
        let seeds = self.gather_seed_snippets(&fetcher, &ticket.body, &base);

        run.advance(TriageState::Negotiating)?;
        let negotiator = Negotiator::new(
            &self.policy,
            NegotiatorConfig {
                max_files: self.config.max_files,
                max_lines: self.config.max_lines,
                default_around: self.config.around_lines,
                body_char_budget: self.config.body_char_budget,
            },
        );
        let negotiation = negotiator.run(self.oracle, &ticket.title, &ticket.body, seeds, |needs| {
            fetcher.fetch_needs(needs, &base, self.config.around_lines)
        });
        let negotiation = match negotiation {
            Ok(negotiation) => negotiation,
            Err(err) => {
                return self.fail(run, format!("❌ Could not reach the patch oracle: {err:#}"));
            }
        };
        info!(
            oracle_calls = negotiation.report.oracle_calls,
            snippets = negotiation.report.snippet_count,
            action = negotiation.result.action(),
            "negotiation finished"
        );

        let (diff, notes) = match negotiation.result {
            AgentResult::RequestContext { reason, .. } => {
                return self.escalate(run, need_context_comment(&reason));
            }
            AgentResult::ProposePatch { diff, notes, .. } => (diff, notes),
        };

        run.advance(TriageState::Validating)?;
        let stats = diff_stats(&diff);
        if let BudgetCheck::Exceeded {
            files_touched,
            changed_lines,
            ..
        } = check_budget(stats, self.config.max_files, self.config.max_lines)
        {
            return self.escalate(
                run,
                format!(
                    "⚠️ Proposed change exceeds budgets (files={files_touched}, lines={changed_lines}). \
Escalating to human review or try narrowing the scope."
                ),
            );
        }

        run.advance(TriageState::Applying)?;
        let patch = match self.prepare_patch(&diff, &base) {
            Ok(files) => PreparedPatch { files, stats, notes },
            Err(err) => return self.fail(run, format!("❌ Could not apply patch: {err:#}")),
        };
        self.publish(run, &base, patch)
    }

    fn base_branch(&self) -> Result<String> {
        match &self.config.base_branch {
            Some(branch) => Ok(branch.clone()),
            None => self.host.default_branch().context("look up default branch"),
        }
    }

    fn gather_seed_snippets(
        &self,
        fetcher: &SnippetFetcher<'_, H>,
        body: &str,
        base: &str,
    ) -> Vec<Snippet> {
        let anchor = RepoAnchor {
            root: &self.config.repo_root,
            name: &self.config.repo_name,
        };
        let locations = parse_stack_text(body, anchor, &self.policy, DEFAULT_LIMIT);
        let seeds = fetcher.fetch_locations(&locations, base, self.config.around_lines);
        info!(
            locations = locations.len(),
            snippets = seeds.len(),
            "gathered seed snippets"
        );
        seeds
    }

    /// Parse, policy-check, and apply the diff in memory against `base`.
    ///
    /// Nothing is written to the host here.
    fn prepare_patch(&self, diff: &str, base: &str) -> Result<Vec<(String, String)>> {
        let parsed = parse_unified_diff(diff);
        if parsed.is_empty() {
            return Err(anyhow!("diff contains no `--- a/` / `+++ b/` file changes"));
        }
        if let Some(path) = parsed
            .paths()
            .find(|path| to_repo_relative(path, "", "") != *path || !self.policy.allowed(path))
        {
            return Err(anyhow!("path not allowed: {path}"));
        }
        let mut updated = Vec::with_capacity(parsed.files().len());
        for file in parsed.files() {
            let current = self
                .host
                .read_file(&file.path, base)
                .with_context(|| format!("read {} at {base}", file.path))?
                .unwrap_or_default();
            let text = apply_hunks(&current, &file.hunks)
                .map_err(|err| anyhow!("{}: {err}", file.path))?;
            updated.push((file.path.clone(), text));
        }
        Ok(updated)
    }

    /// Branch, write, open the draft PR, and confirm.
    fn publish(&self, mut run: Run<'_>, base: &str, patch: PreparedPatch) -> Result<TriageOutcome> {
        let number = run.ticket.number;
        let branch = format!("{}{number}", self.config.branch_prefix);

        let created = self
            .host
            .head_revision(base)
            .and_then(|revision| self.host.create_branch(&branch, &revision));
        if let Err(err) = created {
            return self.fail(
                run,
                format!("❌ Could not create branch `{branch}`: {err:#}"),
            );
        }

        let message = format!(
            "agent: {}",
            run.ticket
                .title
                .chars()
                .take(COMMIT_TITLE_CHARS)
                .collect::<String>()
        );
        let mut written: Vec<&str> = Vec::new();
        for (path, text) in &patch.files {
            if let Err(err) = self.host.write_file(path, text, &message, &branch) {
                let partial = if written.is_empty() {
                    "No files were written.".to_string()
                } else {
                    format!("Already written to `{branch}`: {}.", written.join(", "))
                };
                return self.fail(
                    run,
                    format!("❌ Could not write `{path}` to `{branch}`: {err:#}\n\n{partial}"),
                );
            }
            written.push(path);
        }

        let request = ChangeRequest {
            title: format!("{} #{number}", self.config.pr_title_prefix),
            head: branch.clone(),
            base: base.to_string(),
            body: format!(
                "Draft PR by TicketWatcher (route=llm)\n\nFiles: {} • Lines: {}",
                patch.stats.files_touched, patch.stats.changed_lines
            ),
            draft: true,
        };
        let opened = match self.host.open_change_request(&request) {
            Ok(opened) => opened,
            Err(err) => {
                return self.fail(
                    run,
                    format!("❌ Could not open a draft PR from `{branch}`: {err:#}"),
                );
            }
        };

        let mut confirmation = format!(
            "✅ Draft PR opened: {}\n\n**Branch:** `{branch}`  •  **Base:** `{base}`\n\
**Files touched:** {}  •  **Changed lines:** {}",
            opened.url, patch.stats.files_touched, patch.stats.changed_lines
        );
        if !patch.notes.trim().is_empty() {
            confirmation.push_str(&format!("\n\nNotes: {}", patch.notes.trim()));
        }
        if let Err(err) = self.host.add_comment(opened.number, &confirmation) {
            return self.fail(
                run,
                format!(
                    "❌ Draft PR {} was opened but its confirmation could not be posted: {err:#}",
                    opened.url
                ),
            );
        }

        run.advance(TriageState::Completed)?;
        if let Err(err) = self
            .host
            .add_comment(number, &format!("Draft PR opened: {}", opened.url))
        {
            warn!(ticket = number, err = %format!("{err:#}"), "could not comment on ticket");
        }
        info!(url = %opened.url, "triage completed");
        Ok(run.finish(Some(opened.url)))
    }

    /// End in `NeedsHumanInput` with one comment (and escalation labels).
    fn escalate(&self, mut run: Run<'_>, comment: String) -> Result<TriageOutcome> {
        run.advance(TriageState::NeedsHumanInput)?;
        let number = run.ticket.number;
        self.host
            .add_comment(number, &comment)
            .with_context(|| format!("comment on ticket #{number}"))?;
        let labels = &self.config.escalation_labels;
        if labels.is_empty() {
            return Ok(run.finish(None));
        }
        if let Err(err) = self.host.add_labels(number, labels) {
            warn!(ticket = number, err = %format!("{err:#}"), "could not add escalation labels");
        }
        Ok(run.finish(None))
    }

    /// End in `Failed` with one comment.
    fn fail(&self, mut run: Run<'_>, comment: String) -> Result<TriageOutcome> {
        run.advance(TriageState::Failed)?;
        let number = run.ticket.number;
        warn!(ticket = number, reason = %comment, "triage failed");
        self.host
            .add_comment(number, &comment)
            .with_context(|| format!("comment on ticket #{number}"))?;
        Ok(run.finish(None))
    }
}

fn need_context_comment(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        return NEED_CONTEXT_COMMENT.to_string();
    }
    format!("{NEED_CONTEXT_COMMENT}\n\n> {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn need_context_comment_quotes_reason() {
        assert_eq!(need_context_comment("  "), NEED_CONTEXT_COMMENT);
        let comment = need_context_comment("which file handles login?");
        assert!(comment.starts_with(NEED_CONTEXT_COMMENT));
        assert!(comment.ends_with("\n\n> which file handles login?"));
    }

    #[test]
    fn ignored_outcome_stays_idle() {
        let outcome = TriageOutcome::ignored();
        assert!(outcome.is_ignored());
        assert_eq!(outcome.trail, vec![TriageState::Idle]);
        assert_eq!(outcome.pr_url, None);
    }
}
