//! Inbound reply parsing.
//!
//! Gateway replies are not uniformly shaped. The answer text may sit directly
//! on the directive payload, on a response card, or deep inside a chat-dialog
//! update; the three locations are tried in that order. Per-turn control
//! fields (`is_end`, `prefetch_after_ms`) live on the first nested response
//! directive when the gateway sends one, otherwise on the directive payload.

use serde_json::Value;

use crate::error::{SessionError, SessionResult};

/// Directive name that tells the client to drop the connection.
pub const TEARDOWN_DIRECTIVE: &str = "goaway";

const NESTED_DIRECTIVE_PAYLOAD: &str = "/response/directives/0/payload";
const CARD_TEXT: &str = "/response/card/text";
const CHAT_DIALOG_TEXT: &str =
    "/response/chat_dialog_update/0/add_message_request/messages/0/content/plain_response_text";

/// Where the fragment of a reply was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    DirectText,
    Card,
    ChatDialog,
    /// None of the known locations carried text.
    Unrecognized,
}

/// One part of an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPart {
    pub fragment: Option<String>,
    pub is_final: bool,
    pub next_delay_ms: u64,
    pub shape: FragmentShape,
}

/// A parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The gateway ended the session; reconnect and resubmit.
    Teardown,
    Part(ReplyPart),
}

impl Reply {
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Teardown)
    }
}

/// Parse one received document.
pub fn parse(document: &str) -> SessionResult<Reply> {
    if document.trim().is_empty() {
        return Err(malformed("empty document"));
    }

    let root: Value = serde_json::from_str(document)
        .map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let directive = root
        .get("directive")
        .filter(|d| d.is_object())
        .ok_or_else(|| malformed("missing directive"))?;

    let name = directive
        .pointer("/header/name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing directive.header.name"))?;

    if name.eq_ignore_ascii_case(TEARDOWN_DIRECTIVE) {
        return Ok(Reply::Teardown);
    }

    let payload = directive
        .get("payload")
        .filter(|p| p.is_object())
        .ok_or_else(|| malformed("missing directive.payload"))?;

    let control = payload
        .pointer(NESTED_DIRECTIVE_PAYLOAD)
        .filter(|p| p.is_object())
        .unwrap_or(payload);

    let (fragment, shape) = extract_fragment(control, payload);

    let is_final = match control.get("is_end") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(end)) => *end,
        Some(other) => return Err(malformed(format!("is_end is not a boolean: {other}"))),
    };

    let next_delay_ms = match control.get("prefetch_after_ms") {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_u64().ok_or_else(|| {
            malformed(format!("prefetch_after_ms is not a non-negative integer: {value}"))
        })?,
    };

    Ok(Reply::Part(ReplyPart {
        fragment,
        is_final,
        next_delay_ms,
        shape,
    }))
}

fn extract_fragment(control: &Value, payload: &Value) -> (Option<String>, FragmentShape) {
    let candidates = [
        (control.get("text"), FragmentShape::DirectText),
        (payload.pointer(CARD_TEXT), FragmentShape::Card),
        (payload.pointer(CHAT_DIALOG_TEXT), FragmentShape::ChatDialog),
    ];

    candidates
        .into_iter()
        .find_map(|(value, shape)| {
            value
                .and_then(Value::as_str)
                .map(|text| (Some(text.to_string()), shape))
        })
        .unwrap_or((None, FragmentShape::Unrecognized))
}

fn malformed(reason: impl Into<String>) -> SessionError {
    SessionError::MalformedResponse(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(doc: Value) -> SessionResult<Reply> {
        parse(&doc.to_string())
    }

    fn part(doc: Value) -> ReplyPart {
        match reply(doc).unwrap() {
            Reply::Part(part) => part,
            Reply::Teardown => panic!("unexpected teardown"),
        }
    }

    #[test]
    fn test_direct_text_defaults() {
        let p = part(json!({
            "directive": { "header": { "name": "VinsResponse" }, "payload": { "text": "hi" } }
        }));
        assert_eq!(p.fragment.as_deref(), Some("hi"));
        assert!(p.is_final);
        assert_eq!(p.next_delay_ms, 0);
        assert_eq!(p.shape, FragmentShape::DirectText);
    }

    #[test]
    fn test_direct_text_is_kept_verbatim() {
        let text = "  line one\n\n\"quoted\"\tline two  ";
        let p = part(json!({
            "directive": { "header": { "name": "VinsResponse" }, "payload": { "text": text } }
        }));
        assert_eq!(p.fragment.as_deref(), Some(text));
    }

    #[test]
    fn test_teardown_in_any_case_wins() {
        for name in ["GoAway", "goaway", "GOAWAY", "gOaWaY"] {
            let r = reply(json!({
                "directive": {
                    "header": { "name": name },
                    "payload": { "text": "ignored", "is_end": false }
                }
            }))
            .unwrap();
            assert!(r.is_teardown(), "{name} not detected");
        }
    }

    #[test]
    fn test_teardown_without_payload() {
        let r = reply(json!({ "directive": { "header": { "name": "GoAway" } } })).unwrap();
        assert_eq!(r, Reply::Teardown);
    }

    #[test]
    fn test_card_text_fallback() {
        let p = part(json!({
            "directive": {
                "header": { "name": "VinsResponse" },
                "payload": { "response": { "card": { "text": "x" } } }
            }
        }));
        assert_eq!(p.fragment.as_deref(), Some("x"));
        assert_eq!(p.shape, FragmentShape::Card);
    }

    #[test]
    fn test_chat_dialog_fallback() {
        let p = part(json!({
            "directive": {
                "header": { "name": "VinsResponse" },
                "payload": { "response": { "chat_dialog_update": [{
                    "add_message_request": { "messages": [{
                        "content": { "plain_response_text": "y" }
                    }]}
                }]}}
            }
        }));
        assert_eq!(p.fragment.as_deref(), Some("y"));
        assert_eq!(p.shape, FragmentShape::ChatDialog);
    }

    #[test]
    fn test_direct_text_beats_card() {
        let p = part(json!({
            "directive": {
                "header": { "name": "VinsResponse" },
                "payload": { "text": "direct", "response": { "card": { "text": "card" } } }
            }
        }));
        assert_eq!(p.fragment.as_deref(), Some("direct"));
    }

    #[test]
    fn test_nested_response_directive_carries_control_fields() {
        let p = part(json!({
            "directive": {
                "header": { "name": "VinsResponse" },
                "payload": { "response": {
                    "card": { "text": "card text" },
                    "directives": [{
                        "name": "update_dialog_info",
                        "payload": { "text": "streamed", "is_end": false, "prefetch_after_ms": 250 }
                    }]
                }}
            }
        }));
        assert_eq!(p.fragment.as_deref(), Some("streamed"));
        assert!(!p.is_final);
        assert_eq!(p.next_delay_ms, 250);
    }

    #[test]
    fn test_unknown_shape_yields_no_fragment() {
        let p = part(json!({
            "directive": {
                "header": { "name": "VinsResponse" },
                "payload": { "response": { "suggest": [] } }
            }
        }));
        assert_eq!(p.fragment, None);
        assert_eq!(p.shape, FragmentShape::Unrecognized);
        assert!(p.is_final);
    }

    #[test]
    fn test_malformed_documents() {
        let cases = vec![
            ("", "empty"),
            ("   ", "empty"),
            ("{not json", "invalid JSON"),
            ("[]", "missing directive"),
            (r#"{"directive": "x"}"#, "missing directive"),
            (r#"{"directive": {"payload": {}}}"#, "header.name"),
            (r#"{"directive": {"header": {"name": "VinsResponse"}}}"#, "payload"),
            (
                r#"{"directive": {"header": {"name": "V"}, "payload": {"is_end": "no"}}}"#,
                "is_end",
            ),
            (
                r#"{"directive": {"header": {"name": "V"}, "payload": {"prefetch_after_ms": -5}}}"#,
                "prefetch_after_ms",
            ),
        ];

        for (doc, expected) in cases {
            match parse(doc) {
                Err(SessionError::MalformedResponse(reason)) => {
                    assert!(reason.contains(expected), "{doc:?}: {reason}")
                }
                other => panic!("{doc:?}: expected malformed, got {other:?}"),
            }
        }
    }
}
