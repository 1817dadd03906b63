//! Event gating: decides whether a ticket event starts a triage run.

/// Comment prefix that requests a run from an existing ticket.
pub const COMMENT_TRIGGER: &str = "/agent fix";

/// True for ticket events that should start triage.
///
/// `opened`/`reopened` always trigger. `labeled` triggers only when the added
/// label is a trigger label (or, with no label in the payload, when the ticket
/// already carries one). Any other action triggers when the ticket carries a
/// trigger label.
pub fn should_trigger(
    action: &str,
    added_label: Option<&str>,
    ticket_labels: &[String],
    trigger_labels: &[String],
) -> bool {
    let is_trigger = |name: &str| trigger_labels.iter().any(|t| t == name);
    let carries_trigger = ticket_labels.iter().any(|l| is_trigger(l));
    match action {
        "opened" | "reopened" => true,
        "labeled" => match added_label.filter(|name| !name.is_empty()) {
            Some(name) => is_trigger(name),
            None => carries_trigger,
        },
        _ => carries_trigger,
    }
}

/// True when a new comment asks for a run.
pub fn is_comment_trigger(action: &str, comment: &str) -> bool {
    action == "created"
        && comment
            .trim()
            .to_lowercase()
            .starts_with(COMMENT_TRIGGER)
}

/// Ticket body with the triggering comment appended.
pub fn merge_comment(body: &str, comment: &str) -> String {
    if body.is_empty() {
        return comment.to_string();
    }
    format!("{body}\n\n{comment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn opened_and_reopened_always_trigger() {
        let triggers = labels(&["agent-fix"]);
        assert!(should_trigger("opened", None, &[], &triggers));
        assert!(should_trigger("reopened", None, &[], &triggers));
    }

    #[test]
    fn labeled_requires_trigger_label() {
        let triggers = labels(&["agent-fix", "auto-pr"]);
        let carried = labels(&["agent-fix", "bug"]);
        assert!(should_trigger("labeled", Some("auto-pr"), &[], &triggers));
        assert!(!should_trigger("labeled", Some("bug"), &carried, &triggers));
        assert!(should_trigger("labeled", None, &carried, &triggers));
        assert!(!should_trigger("labeled", None, &[], &triggers));
    }

    #[test]
    fn other_actions_need_a_carried_trigger_label() {
        let triggers = labels(&["agent-fix"]);
        assert!(should_trigger("edited", None, &labels(&["agent-fix"]), &triggers));
        assert!(!should_trigger("edited", None, &labels(&["bug"]), &triggers));
        assert!(!should_trigger("closed", None, &[], &triggers));
    }

    #[test]
    fn comment_trigger_is_case_insensitive_prefix() {
        assert!(is_comment_trigger("created", "  /Agent Fix please\n"));
        assert!(!is_comment_trigger("edited", "/agent fix"));
        assert!(!is_comment_trigger("created", "please /agent fix"));
    }

    #[test]
    fn merge_comment_appends_after_blank_line() {
        assert_eq!(merge_comment("body", "/agent fix"), "body\n\n/agent fix");
        assert_eq!(merge_comment("", "/agent fix"), "/agent fix");
    }
}
