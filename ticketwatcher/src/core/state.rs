//! Triage run states and the legal transitions between them.
//!
//! ```text
//! Idle -> Triggered -> GatheringContext -> Negotiating -> Validating -> Applying -> Completed
//!                                              |              |            |
//!                                              v              v            v
//!                                       NeedsHumanInput  NeedsHumanInput  Failed
//! ```
//!
//! `Negotiating` and `Applying` may also end in `Failed` (oracle transport
//! error, host write error). `Completed`, `NeedsHumanInput`, and `Failed` are
//! absorbing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageState {
    Idle,
    Triggered,
    GatheringContext,
    Negotiating,
    Validating,
    Applying,
    Completed,
    NeedsHumanInput,
    Failed,
}

impl TriageState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TriageState::Completed | TriageState::NeedsHumanInput | TriageState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriageState::Idle => "idle",
            TriageState::Triggered => "triggered",
            TriageState::GatheringContext => "gathering_context",
            TriageState::Negotiating => "negotiating",
            TriageState::Validating => "validating",
            TriageState::Applying => "applying",
            TriageState::Completed => "completed",
            TriageState::NeedsHumanInput => "needs_human_input",
            TriageState::Failed => "failed",
        }
    }
}

/// True if the orchestrator may move from `from` to `to`.
pub fn can_transition(from: TriageState, to: TriageState) -> bool {
    use TriageState::{
        Applying, Completed, Failed, GatheringContext, Idle, Negotiating, NeedsHumanInput,
        Triggered, Validating,
    };
    matches!(
        (from, to),
        (Idle, Triggered)
            | (Triggered, GatheringContext)
            | (GatheringContext, Negotiating)
            | (GatheringContext, Failed)
            | (Negotiating, Validating)
            | (Negotiating, NeedsHumanInput)
            | (Negotiating, Failed)
            | (Validating, Applying)
            | (Validating, NeedsHumanInput)
            | (Applying, Completed)
            | (Applying, Failed)
    )
}

/// Ordered record of the states a run has visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    states: Vec<TriageState>,
}

impl Default for StateTrail {
    fn default() -> Self {
        Self {
            states: vec![TriageState::Idle],
        }
    }
}

impl StateTrail {
    pub fn current(&self) -> TriageState {
        *self.states.last().unwrap_or(&TriageState::Idle)
    }

    /// Record a transition, rejecting edges outside the state machine.
    pub fn advance(&mut self, to: TriageState) -> Result<(), String> {
        let from = self.current();
        if !can_transition(from, to) {
            return Err(format!(
                "illegal triage transition {} -> {}",
                from.as_str(),
                to.as_str()
            ));
        }
        self.states.push(to);
        Ok(())
    }

    pub fn states(&self) -> &[TriageState] {
        &self.states
    }
}
