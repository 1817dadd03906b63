//! End-to-end triage tests against in-memory host and oracle doubles.
//!
//! Each test drives one ticket event through `Triage` and asserts on the
//! terminal state, the state trail, and every side effect the host saw.

use pretty_assertions::assert_eq;
use serde_json::json;

use ticketwatcher::core::state::TriageState;
use ticketwatcher::io::config::TicketWatcherConfig;
use ticketwatcher::io::event::{IssueCommentEvent, IssueEvent};
use ticketwatcher::test_support::{MemoryHost, ScriptedOracle, WriteRecord};
use ticketwatcher::triage::{NEED_CONTEXT_COMMENT, Triage};

const TICKET: u64 = 42;
const AUTH_PY: &str = "def login(user):\n    return user.name\n";
const AUTH_FIXED: &str = "def login(user):\n    return getattr(user, \"name\", None)\n";
const AUTH_DIFF: &str = "--- a/src/app/auth.py\n+++ b/src/app/auth.py\n@@ -1,2 +1,2 @@\n def login(user):\n-    return user.name\n+    return getattr(user, \"name\", None)\n";

fn labeled_event(body: &str) -> IssueEvent {
    serde_json::from_value(json!({
        "action": "labeled",
        "label": { "name": "agent-fix" },
        "issue": {
            "number": TICKET,
            "title": "Login crashes for anonymous users",
            "body": body,
            "labels": [{ "name": "agent-fix" }]
        }
    }))
    .expect("issue event")
}

fn traceback_body() -> String {
    "Traceback (most recent call last):\n  File \"src/app/auth.py\", line 2, in login\nAttributeError: 'NoneType' object has no attribute 'name'".to_string()
}

fn repo() -> MemoryHost {
    MemoryHost::new("main").with_file("main", "src/app/auth.py", AUTH_PY)
}

fn patch_reply(diff: &str, notes: &str) -> String {
    json!({
        "action": "propose_patch",
        "diff": diff,
        "files_touched": [],
        "estimated_changed_lines": 0,
        "notes": notes
    })
    .to_string()
}

fn one_line_diff(path: &str) -> String {
    format!("--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n-old\n+new\n")
}

#[test]
fn labeled_ticket_with_traceback_opens_draft_pr() {
    let host = repo();
    let oracle = ScriptedOracle::new(vec![patch_reply(AUTH_DIFF, "guard missing user")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(
        outcome.pr_url.as_deref(),
        Some("https://example.test/pull/100")
    );
    assert_eq!(
        outcome.trail,
        vec![
            TriageState::Idle,
            TriageState::Triggered,
            TriageState::GatheringContext,
            TriageState::Negotiating,
            TriageState::Validating,
            TriageState::Applying,
            TriageState::Completed,
        ]
    );

    // Round 1 already proposed a patch, so there is no second call.
    assert_eq!(oracle.calls(), 1);
    oracle.assert_drained().expect("drained");
    let prompt = &oracle.prompts()[0].user;
    assert!(prompt.contains("### src/app/auth.py"), "seed snippet in prompt");
    assert!(prompt.contains("return user.name"));

    assert_eq!(
        host.branches_created(),
        vec![("agent-fix/42".to_string(), "main@head".to_string())]
    );
    assert_eq!(
        host.writes(),
        vec![WriteRecord {
            path: "src/app/auth.py".to_string(),
            text: AUTH_FIXED.to_string(),
            message: "agent: Login crashes for anonymous users".to_string(),
            branch: "agent-fix/42".to_string(),
        }]
    );
    assert_eq!(host.file("main", "src/app/auth.py").as_deref(), Some(AUTH_PY));

    let requests = host.change_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].title, "agent: auto-fix for issue #42");
    assert_eq!(requests[0].head, "agent-fix/42");
    assert_eq!(requests[0].base, "main");
    assert!(requests[0].draft);
    assert_eq!(
        requests[0].body,
        "Draft PR by TicketWatcher (route=llm)\n\nFiles: 1 • Lines: 2"
    );

    let confirmation = host.comments_on(100);
    assert_eq!(confirmation.len(), 1);
    assert!(confirmation[0].starts_with("✅ Draft PR opened: https://example.test/pull/100"));
    assert!(confirmation[0].contains("Notes: guard missing user"));
    assert_eq!(
        host.comments_on(TICKET),
        vec!["Draft PR opened: https://example.test/pull/100".to_string()]
    );
}

#[test]
fn oversized_patch_escalates_without_writing() {
    let host = repo();
    let diff: String = (1..=5)
        .map(|n| one_line_diff(&format!("src/m{n}.py")))
        .collect();
    let oracle = ScriptedOracle::new(vec![patch_reply(&diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::NeedsHumanInput);
    assert_eq!(outcome.pr_url, None);
    assert_eq!(
        outcome.trail.last().copied(),
        Some(TriageState::NeedsHumanInput)
    );
    assert!(outcome.trail.contains(&TriageState::Validating));
    assert!(!outcome.trail.contains(&TriageState::Applying));
    assert!(host.writes().is_empty());
    assert!(host.branches_created().is_empty());
    let comments = host.comments_on(TICKET);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("exceeds budgets (files=5, lines=10)"));
}

#[test]
fn disallowed_path_fails_with_one_comment() {
    let host = repo();
    let oracle = ScriptedOracle::new(vec![patch_reply(&one_line_diff("infra/deploy.sh"), "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert!(host.writes().is_empty());
    assert!(host.change_requests().is_empty());
    let comments = host.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, TICKET);
    assert!(comments[0].1.contains("path not allowed: infra/deploy.sh"));
}

#[test]
fn traversal_inside_allowed_prefix_is_rejected() {
    let host = repo();
    let oracle = ScriptedOracle::new(vec![patch_reply(&one_line_diff("src/../etc/passwd"), "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert!(host.writes().is_empty());
    assert!(host.comments_on(TICKET)[0].contains("path not allowed: src/../etc/passwd"));
}

#[test]
fn stale_context_lines_are_applied_as_written() {
    let host = repo();
    let diff = "--- a/src/app/auth.py\n+++ b/src/app/auth.py\n@@ -1,2 +1,2 @@\n def logout(user):\n-    return None\n+    return True\n";
    let oracle = ScriptedOracle::new(vec![patch_reply(diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    // The applier follows the hunk cursor and emits the patch's own context.
    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(
        host.file("agent-fix/42", "src/app/auth.py").as_deref(),
        Some("def logout(user):\n    return True\n")
    );
}

#[test]
fn out_of_order_hunks_fail_before_branching() {
    let host = repo();
    let diff = "--- a/src/app/auth.py\n+++ b/src/app/auth.py\n@@ -2,1 +2,1 @@\n-    return user.name\n+    return None\n@@ -1,1 +1,1 @@\n-def login(user):\n+def login(user=None):\n";
    let oracle = ScriptedOracle::new(vec![patch_reply(diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert_eq!(
        outcome.trail.last().copied(),
        Some(TriageState::Failed)
    );
    assert!(outcome.trail.contains(&TriageState::Applying));
    assert!(host.branches_created().is_empty());
    assert!(host.writes().is_empty());
    let comments = host.comments_on(TICKET);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].starts_with("❌ Could not apply patch"));
    assert!(comments[0].contains("overlaps or precedes"));
}

#[test]
fn hunk_past_end_of_file_fails_before_branching() {
    let host = repo();
    let diff = "--- a/src/app/auth.py\n+++ b/src/app/auth.py\n@@ -9,1 +9,1 @@\n-x\n+y\n";
    let oracle = ScriptedOracle::new(vec![patch_reply(diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert!(host.branches_created().is_empty());
    assert!(host.comments_on(TICKET)[0].contains("starts past end of file"));
}

#[test]
fn needs_outside_policy_run_round_two_with_seeds_only() {
    let host = repo().with_file("main", "infra/settings.py", "SECRET = 1\n");
    let oracle = ScriptedOracle::new(vec![
        json!({
            "action": "request_context",
            "needs": [{ "path": "infra/settings.py", "line": 1 }],
            "reason": "where is the user loaded?"
        })
        .to_string(),
        patch_reply(AUTH_DIFF, ""),
    ]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(oracle.calls(), 2);
    let second = &oracle.prompts()[1].user;
    assert!(second.contains("- infra/settings.py"));
    assert!(!second.contains("SECRET"));
    assert!(second.contains("This is the final round."));
}

#[test]
fn requested_context_is_fetched_for_round_two() {
    let host = repo().with_file(
        "main",
        "src/app/users.py",
        "import os\n\ndef load_user(uid):\n    return None\n",
    );
    let oracle = ScriptedOracle::new(vec![
        json!({
            "action": "request_context",
            "needs": [{ "path": "src/app/users.py", "symbol": "load_user" }],
            "reason": "need the loader"
        })
        .to_string(),
        patch_reply(AUTH_DIFF, ""),
    ]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    let second = &oracle.prompts()[1].user;
    let seed = second.find("### src/app/auth.py").expect("seed snippet");
    let fetched = second.find("### src/app/users.py").expect("fetched snippet");
    assert!(seed < fetched);
    assert!(second.contains("def load_user(uid):"));
}

#[test]
fn final_request_context_asks_a_human_and_labels() {
    let host = repo();
    let ask = json!({
        "action": "request_context",
        "needs": [{ "path": "src/app/session.py" }],
        "reason": "cannot see the session store"
    })
    .to_string();
    let oracle = ScriptedOracle::new(vec![ask.clone(), ask]);
    let config = TicketWatcherConfig {
        escalation_labels: vec!["needs-info".to_string()],
        ..TicketWatcherConfig::default()
    };

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event("nothing useful here"))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::NeedsHumanInput);
    assert_eq!(
        outcome.trail,
        vec![
            TriageState::Idle,
            TriageState::Triggered,
            TriageState::GatheringContext,
            TriageState::Negotiating,
            TriageState::NeedsHumanInput,
        ]
    );
    assert_eq!(oracle.calls(), 2);
    let comments = host.comments_on(TICKET);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].starts_with(NEED_CONTEXT_COMMENT));
    assert!(comments[0].ends_with("> cannot see the session store"));
    assert_eq!(
        host.labels(),
        vec![(TICKET, vec!["needs-info".to_string()])]
    );
}

#[test]
fn irrelevant_event_touches_nothing() {
    let host = repo();
    let oracle = ScriptedOracle::new(Vec::new());
    let config = TicketWatcherConfig::default();
    let event: IssueEvent = serde_json::from_value(json!({
        "action": "edited",
        "issue": { "number": TICKET, "title": "typo", "body": "", "labels": [] }
    }))
    .expect("event");

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&event)
        .expect("triage");

    assert!(outcome.is_ignored());
    assert_eq!(outcome.trail, vec![TriageState::Idle]);
    assert_eq!(oracle.calls(), 0);
    assert!(host.untouched());
}

#[test]
fn comment_trigger_merges_comment_into_body() {
    let host = repo();
    let oracle = ScriptedOracle::new(vec![patch_reply(AUTH_DIFF, "")]);
    let config = TicketWatcherConfig::default();
    let event: IssueCommentEvent = serde_json::from_value(json!({
        "action": "created",
        "issue": { "number": TICKET, "title": "Login crash", "body": null, "labels": [] },
        "comment": { "body": "/agent fix\nFile \"src/app/auth.py\", line 2, in login" }
    }))
    .expect("event");

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_comment_added(&event)
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert!(oracle.prompts()[0].user.contains("### src/app/auth.py"));
    assert_eq!(host.writes().len(), 1);
}

#[test]
fn ordinary_comment_is_ignored() {
    let host = repo();
    let oracle = ScriptedOracle::new(Vec::new());
    let config = TicketWatcherConfig::default();
    let event: IssueCommentEvent = serde_json::from_value(json!({
        "action": "created",
        "issue": { "number": TICKET, "title": "t", "labels": [{ "name": "agent-fix" }] },
        "comment": { "body": "any update on this?" }
    }))
    .expect("event");

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_comment_added(&event)
        .expect("triage");

    assert!(outcome.is_ignored());
    assert!(host.untouched());
}

#[test]
fn write_failure_reports_files_already_written() {
    let host = repo()
        .with_file("main", "src/a.py", "old\n")
        .with_file("main", "src/b.py", "old\n");
    host.fail_write_at(1);
    let diff = format!("{}{}", one_line_diff("src/a.py"), one_line_diff("src/b.py"));
    let oracle = ScriptedOracle::new(vec![patch_reply(&diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert_eq!(host.writes().len(), 1);
    assert!(host.change_requests().is_empty());
    let comments = host.comments_on(TICKET);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("Could not write `src/b.py`"));
    assert!(comments[0].contains("Already written to `agent-fix/42`: src/a.py."));
}

#[test]
fn new_file_patch_creates_file() {
    let host = repo();
    let diff = "--- a/src/app/guards.py\n+++ b/src/app/guards.py\n@@ -0,0 +1,2 @@\n+def require_user(user):\n+    return user is not None\n";
    let oracle = ScriptedOracle::new(vec![patch_reply(diff, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(
        host.file("agent-fix/42", "src/app/guards.py").as_deref(),
        Some("def require_user(user):\n    return user is not None\n")
    );
}

#[test]
fn ticket_comment_failure_after_pr_still_completes() {
    let host = repo();
    host.fail_comments_on(TICKET);
    let oracle = ScriptedOracle::new(vec![patch_reply(AUTH_DIFF, "")]);
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(host.comments_on(100).len(), 1);
    assert!(host.comments_on(TICKET).is_empty());
}

#[test]
fn oracle_outage_fails_the_run() {
    let host = repo();
    let oracle = ScriptedOracle::new(Vec::new());
    let config = TicketWatcherConfig::default();

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Failed);
    assert_eq!(
        outcome.trail.last().copied(),
        Some(TriageState::Failed)
    );
    let comments = host.comments_on(TICKET);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].starts_with("❌ Could not reach the patch oracle"));
    assert!(host.writes().is_empty());
}

#[test]
fn configured_base_branch_is_used() {
    let host = repo().with_file("develop", "src/app/auth.py", AUTH_PY);
    let oracle = ScriptedOracle::new(vec![patch_reply(AUTH_DIFF, "")]);
    let config = TicketWatcherConfig {
        base_branch: Some("develop".to_string()),
        ..TicketWatcherConfig::default()
    };

    let outcome = Triage::new(&host, &oracle, &config)
        .process_ticket_opened(&labeled_event(&traceback_body()))
        .expect("triage");

    assert_eq!(outcome.state, TriageState::Completed);
    assert_eq!(
        host.branches_created(),
        vec![("agent-fix/42".to_string(), "develop@head".to_string())]
    );
    assert_eq!(host.change_requests()[0].base, "develop");
}
