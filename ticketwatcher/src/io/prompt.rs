//! Prompt builder for oracle requests.
//!
//! Two templates are rendered: a fixed system contract describing the JSON
//! reply shape and the limits, and a per-round user message carrying the
//! ticket and the snippets gathered so far.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::types::Snippet;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system_contract.md");
const NEGOTIATOR_TEMPLATE: &str = include_str!("prompts/negotiator.md");

const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Limits stated to the oracle in the system contract.
#[derive(Debug, Clone)]
pub struct PromptLimits {
    /// Human-readable allow-list (`*` when unrestricted).
    pub allowed: String,
    pub max_files: usize,
    pub max_lines: usize,
}

/// Per-round inputs for the user message.
#[derive(Debug, Clone, Copy)]
pub struct RoundInputs<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub snippets: &'a [Snippet],
    /// Need paths dropped by the allow-list before this round.
    pub rejected: &'a [String],
    pub final_round: bool,
}

/// A rendered system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptBuilder {
    env: Environment<'static>,
    limits: PromptLimits,
    body_char_budget: usize,
}

impl PromptBuilder {
    pub fn new(limits: PromptLimits, body_char_budget: usize) -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("negotiator", NEGOTIATOR_TEMPLATE)
            .expect("negotiator template should be valid");
        Self {
            env,
            limits,
            body_char_budget,
        }
    }

    pub fn system(&self) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template.render(context! {
            allowed => self.limits.allowed,
            max_files => self.limits.max_files,
            max_lines => self.limits.max_lines,
        })?;
        Ok(rendered.trim().to_string())
    }

    pub fn round(&self, input: RoundInputs<'_>) -> Result<String> {
        let body = truncate_chars(input.body.trim(), self.body_char_budget);
        let template = self.env.get_template("negotiator")?;
        let rendered = template.render(context! {
            title => input.title.trim(),
            body => body,
            snippets => input.snippets,
            rejected => input.rejected,
            final_round => input.final_round,
            max_files => self.limits.max_files,
        })?;
        debug!(
            snippets = input.snippets.len(),
            bytes = rendered.len(),
            final_round = input.final_round,
            "rendered negotiation prompt"
        );
        Ok(rendered.trim().to_string())
    }

    pub fn pair(&self, input: RoundInputs<'_>) -> Result<PromptPair> {
        Ok(PromptPair {
            system: self.system()?,
            user: self.round(input)?,
        })
    }
}

/// Keep at most `budget` chars of `text`, marking the cut.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut out = text[..cut].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(
            PromptLimits {
                allowed: "src/, app/".to_string(),
                max_files: 4,
                max_lines: 200,
            },
            40,
        )
    }

    fn snippet() -> Snippet {
        Snippet {
            path: "src/app/auth.py".to_string(),
            start_line: 1,
            end_line: 2,
            code: "def get_user(u):\n    return u['name']".to_string(),
        }
    }

    #[test]
    fn system_prompt_states_limits() {
        let system = builder().system().expect("render");
        assert!(system.contains("\"action\": \"request_context\""));
        assert!(system.contains("Only paths under: src/, app/"));
        assert!(system.contains("At most 4 files and 200 changed lines"));
    }

    #[test]
    fn round_prompt_orders_ticket_then_snippets() {
        let snippets = [snippet()];
        let user = builder()
            .round(RoundInputs {
                title: "KeyError in auth",
                body: "boom",
                snippets: &snippets,
                rejected: &[],
                final_round: false,
            })
            .expect("render");
        let ticket = user.find("**Title:** KeyError in auth").expect("title");
        let source = user
            .find("### src/app/auth.py (lines 1-2)")
            .expect("snippet header");
        assert!(ticket < source);
        assert!(user.contains("return u['name']"), "code is not escaped");
        assert!(!user.contains("Rejected context requests"));
        assert!(!user.contains("final round"));
    }

    #[test]
    fn final_round_lists_rejected_paths() {
        let rejected = vec!["infra/deploy.py".to_string()];
        let user = builder()
            .round(RoundInputs {
                title: "t",
                body: "b",
                snippets: &[],
                rejected: &rejected,
                final_round: true,
            })
            .expect("render");
        assert!(user.contains("No source snippets could be retrieved"));
        assert!(user.contains("- infra/deploy.py"));
        assert!(user.contains("This is the final round."));
    }

    #[test]
    fn long_body_is_truncated_with_marker() {
        let body = "x".repeat(100);
        let user = builder()
            .round(RoundInputs {
                title: "t",
                body: &body,
                snippets: &[],
                rejected: &[],
                final_round: false,
            })
            .expect("render");
        assert!(user.contains(&format!("{}\n[truncated]", "x".repeat(40))));
        assert!(!user.contains(&"x".repeat(41)));
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé\n[truncated]");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }
}
