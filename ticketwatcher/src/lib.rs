//! Ticket-to-draft-PR triage engine.
//!
//! A triggering ticket is scanned for file/line hints, bounded source snippets
//! are fetched, and an oracle is asked (at most twice) for a unified diff. A
//! diff that fits the file/line budget and the path allow-list is applied in
//! memory, committed to a fresh branch, and opened as a draft pull request.
//!
//! - **[`core`]**: Pure, deterministic logic (stack parsing, path policy, diff
//!   codec, budgets, oracle contract, state machine). No I/O.
//! - **[`io`]**: Configuration, event payloads, and the host/oracle adapters.
//! - **[`agents`]**: The two-round negotiator.
//! - **[`triage`]**: The orchestrator that ties them together.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod triage;
