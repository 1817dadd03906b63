//! Decoding of raw oracle text into [`AgentResult`].
//!
//! Decoding never fails: output without a JSON object of a known shape
//! degrades to `RequestContext` with no needs and a diagnostic reason. When
//! the text around the object is not JSON (prose, a one-line fence), the first
//! JSON object in it is used.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::core::types::AgentResult;

pub const AGENT_RESULT_SCHEMA: &str = include_str!("../../schemas/agent_result.schema.json");

static VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(AGENT_RESULT_SCHEMA).expect("agent result schema should be JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("agent result schema should compile")
});

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// First complete JSON object embedded in `text`, if any.
pub fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}

/// Classify oracle output into the strict action union.
pub fn decode_agent_result(raw: &str) -> AgentResult {
    let text = strip_code_fences(raw);
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => match first_json_object(text) {
            Some(value) => value,
            None => return AgentResult::degraded(format!("oracle output is not JSON: {err}")),
        },
    };

    let action = value.get("action").and_then(Value::as_str).unwrap_or("");
    if action != "request_context" && action != "propose_patch" {
        return AgentResult::degraded(format!(
            "oracle output has unknown action '{action}'"
        ));
    }

    let messages: Vec<String> = VALIDATOR.iter_errors(&value).map(|e| e.to_string()).collect();
    if !messages.is_empty() {
        return AgentResult::degraded(format!(
            "oracle output violates the {action} contract: {}",
            messages.join("; ")
        ));
    }

    match serde_json::from_value(value) {
        Ok(result) => result,
        Err(err) => AgentResult::degraded(format!("oracle output could not be decoded: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Need;

    fn degraded_reason(result: &AgentResult) -> &str {
        match result {
            AgentResult::RequestContext { needs, reason } if needs.is_empty() => reason,
            other => panic!("expected degraded result, got {other:?}"),
        }
    }

    #[test]
    fn decodes_propose_patch() {
        let raw = r#"{"action":"propose_patch","diff":"--- a/x\n+++ b/x\n","files_touched":["x"],"estimated_changed_lines":2,"notes":"n"}"#;
        assert_eq!(
            decode_agent_result(raw),
            AgentResult::ProposePatch {
                diff: "--- a/x\n+++ b/x\n".to_string(),
                files_touched: vec!["x".to_string()],
                estimated_changed_lines: 2,
                notes: "n".to_string(),
            }
        );
    }

    #[test]
    fn decodes_request_context_inside_fences() {
        let raw = "```json\n{\"action\":\"request_context\",\"needs\":[{\"path\":\"src/a.py\",\"symbol\":\"f\",\"around_lines\":30}],\"reason\":\"need f\"}\n```";
        assert_eq!(
            decode_agent_result(raw),
            AgentResult::RequestContext {
                needs: vec![Need {
                    path: "src/a.py".to_string(),
                    symbol: Some("f".to_string()),
                    line: None,
                    around_lines: 30,
                }],
                reason: "need f".to_string(),
            }
        );
    }

    #[test]
    fn prose_degrades() {
        let result = decode_agent_result("Sure! Here is the fix you asked for.");
        assert!(degraded_reason(&result).contains("not JSON"));
    }

    #[test]
    fn one_line_fence_is_decoded() {
        let raw = r#"```json {"action":"request_context","needs":[],"reason":"which file?"}```"#;
        assert_eq!(
            decode_agent_result(raw),
            AgentResult::RequestContext {
                needs: Vec::new(),
                reason: "which file?".to_string(),
            }
        );
    }

    #[test]
    fn json_object_after_prose_is_decoded() {
        let raw = "Here is the patch:\n{\"action\":\"propose_patch\",\"diff\":\"--- a/x\\n+++ b/x\\n\"}\nLet me know!";
        match decode_agent_result(raw) {
            AgentResult::ProposePatch { diff, .. } => assert_eq!(diff, "--- a/x\n+++ b/x\n"),
            other => panic!("expected patch, got {other:?}"),
        }
    }

    #[test]
    fn first_json_object_skips_unbalanced_braces() {
        let value = first_json_object(r#"set {x} then {"a":1} and {"b":2}"#).expect("object");
        assert_eq!(value, serde_json::json!({"a": 1}));
        assert_eq!(first_json_object("no braces here"), None);
    }

    #[test]
    fn unknown_action_degrades() {
        let result = decode_agent_result(r#"{"action":"rewrite_everything"}"#);
        assert!(degraded_reason(&result).contains("unknown action 'rewrite_everything'"));
        let result = decode_agent_result(r#"[1, 2, 3]"#);
        assert!(degraded_reason(&result).contains("unknown action ''"));
    }

    #[test]
    fn shape_violation_degrades() {
        let result = decode_agent_result(r#"{"action":"propose_patch","diff":42}"#);
        assert!(degraded_reason(&result).contains("violates the propose_patch contract"));
        let result = decode_agent_result(r#"{"action":"request_context","needs":[{"line":3}]}"#);
        assert!(degraded_reason(&result).contains("violates the request_context contract"));
    }

    #[test]
    fn strip_code_fences_handles_bare_and_tagged_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  ```JSON\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("{}"), "{}");
    }
}
