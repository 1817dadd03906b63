//! Two-round patch negotiation with the oracle.
//!
//! Round 1 sees the seed snippets. If the oracle asks for more context, the
//! sanitized needs are fetched through a caller-supplied callback and round 2
//! runs with the augmented snippet list. Round 2's result is final whatever
//! its action; there is no third call.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::contract::decode_agent_result;
use crate::core::path::{sanitize_path_token, to_repo_relative};
use crate::core::policy::PathPolicy;
use crate::core::types::{AgentResult, Need, Snippet};
use crate::io::oracle::Oracle;
use crate::io::prompt::{PromptBuilder, PromptLimits, RoundInputs};

/// Smallest context window a need may request.
pub const MIN_AROUND_LINES: u32 = 10;

/// Limits for a negotiation.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    pub max_files: usize,
    pub max_lines: usize,
    /// Default (and maximum) context window for needs.
    pub default_around: usize,
    pub body_char_budget: usize,
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiationReport {
    pub oracle_calls: u32,
    /// Snippets shown to the oracle in the last round.
    pub snippet_count: usize,
    /// Needs dropped by sanitization.
    pub rejected_needs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub result: AgentResult,
    pub report: NegotiationReport,
}

/// Needs that survived sanitization, plus the paths that did not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedNeeds {
    pub kept: Vec<Need>,
    pub rejected: Vec<String>,
}

/// Normalize need paths, drop those outside `policy`, and clamp windows.
///
/// A need without a window (`around_lines == 0`) gets `default_around`.
pub fn sanitize_needs(needs: &[Need], policy: &PathPolicy, default_around: usize) -> SanitizedNeeds {
    let ceiling = u32::try_from(default_around)
        .unwrap_or(u32::MAX)
        .max(MIN_AROUND_LINES);
    let mut out = SanitizedNeeds::default();
    for need in needs {
        let path = to_repo_relative(&sanitize_path_token(&need.path), "", "");
        if path.is_empty() || !policy.allowed(&path) {
            debug!(path = %need.path, "need rejected by path policy");
            out.rejected.push(need.path.clone());
            continue;
        }
        out.kept.push(Need {
            path,
            symbol: need.symbol.clone(),
            line: need.line,
            around_lines: match need.around_lines {
                0 => ceiling,
                n => n.clamp(MIN_AROUND_LINES, ceiling),
            },
        });
    }
    out
}

/// Negotiator that owns prompt settings and the path policy.
pub struct Negotiator<'a> {
    policy: &'a PathPolicy,
    config: NegotiatorConfig,
    prompts: PromptBuilder,
}

impl<'a> Negotiator<'a> {
    pub fn new(policy: &'a PathPolicy, config: NegotiatorConfig) -> Self {
        let prompts = PromptBuilder::new(
            PromptLimits {
                allowed: policy.describe(),
                max_files: config.max_files,
                max_lines: config.max_lines,
            },
            config.body_char_budget,
        );
        Self {
            policy,
            config,
            prompts,
        }
    }

    /// Run at most two oracle rounds and return the final result.
    ///
    /// `fetch` resolves sanitized needs to snippets; absent snippets are simply
    /// omitted from its output. Oracle transport errors propagate.
    #[instrument(skip_all, fields(seeds = seeds.len()))]
    pub fn run<O, F>(
        &self,
        oracle: &O,
        title: &str,
        body: &str,
        seeds: Vec<Snippet>,
        mut fetch: F,
    ) -> Result<Negotiation>
    where
        O: Oracle,
        F: FnMut(&[Need]) -> Vec<Snippet>,
    {
        let mut report = NegotiationReport {
            snippet_count: seeds.len(),
            ..NegotiationReport::default()
        };

        let first = self.round(oracle, title, body, &seeds, &[], false, &mut report)?;
        let needs = match &first {
            AgentResult::RequestContext { needs, .. } => needs.clone(),
            AgentResult::ProposePatch { .. } => Vec::new(),
        };
        if needs.is_empty() {
            debug!(action = first.action(), "no further context requested; stopping after round 1");
            return Ok(Negotiation {
                result: first,
                report,
            });
        }

        let sanitized = sanitize_needs(&needs, self.policy, self.config.default_around);
        report.rejected_needs = sanitized.rejected.len();

        let mut snippets = seeds;
        if !sanitized.kept.is_empty() {
            let fetched = fetch(&sanitized.kept);
            info!(
                requested = sanitized.kept.len(),
                fetched = fetched.len(),
                "fetched context for round 2"
            );
            snippets.extend(fetched);
        }
        report.snippet_count = snippets.len();

        let second = self.round(
            oracle,
            title,
            body,
            &snippets,
            &sanitized.rejected,
            true,
            &mut report,
        )?;
        Ok(Negotiation {
            result: second,
            report,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn round<O: Oracle>(
        &self,
        oracle: &O,
        title: &str,
        body: &str,
        snippets: &[Snippet],
        rejected: &[String],
        final_round: bool,
        report: &mut NegotiationReport,
    ) -> Result<AgentResult> {
        let prompt = self.prompts.pair(RoundInputs {
            title,
            body,
            snippets,
            rejected,
            final_round,
        })?;
        report.oracle_calls += 1;
        let raw = oracle
            .complete(&prompt.system, &prompt.user)
            .with_context(|| format!("oracle round {}", report.oracle_calls))?;
        let result = decode_agent_result(&raw);
        info!(
            round = report.oracle_calls,
            action = result.action(),
            "oracle round complete"
        );
        Ok(result)
    }
}
