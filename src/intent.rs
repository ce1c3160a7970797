//! Agent reply decoding
//!
//! The cloud agent answers each utterance with a JSON object:
//!
//! ```json
//! {"intent": "home", "needs_confirmation": true, "tts_confirm": "Lock the door?", "command": "lock_door"}
//! ```
//!
//! Every key is optional and unknown keys are ignored. Decoding is lenient per
//! field (a wrong-typed field reads as absent) but strict about the envelope:
//! anything that is not a JSON object is rejected as a whole.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire key for the intent label
const KEY_INTENT: &str = "intent";

/// Wire key for the confirmation flag
const KEY_NEEDS_CONFIRMATION: &str = "needs_confirmation";

/// Wire key for the spoken confirmation prompt
const KEY_TTS_CONFIRM: &str = "tts_confirm";

/// Wire key for the opaque command payload
const KEY_COMMAND: &str = "command";

/// Reply body that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Body was empty or whitespace only
    #[error("empty reply body")]
    Empty,

    /// Body was not UTF-8, not JSON, or not a JSON object
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Typed view of one agent reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentReply {
    /// Short label classifying the request
    pub intent: Option<String>,

    /// Whether the user must confirm before the command runs
    pub needs_confirmation: bool,

    /// Text to speak before waiting for the user's answer
    #[serde(rename = "tts_confirm")]
    pub confirmation_prompt: Option<String>,

    /// Payload for the execution layer, passed through verbatim
    pub command: Option<String>,
}

/// Decode a raw reply buffer
///
/// # Errors
///
/// Returns `ParseError::Empty` for a blank body and `ParseError::Malformed`
/// when the body is not UTF-8 or not a JSON object
pub fn parse(raw: &[u8]) -> Result<IntentReply, ParseError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ParseError::Malformed(format!("invalid utf-8: {e}")))?;
    parse_str(text)
}

/// Decode a reply that is already text
///
/// # Errors
///
/// Same as [`parse`]
pub fn parse_str(text: &str) -> Result<IntentReply, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(ParseError::Malformed(format!(
            "expected a JSON object, found {}",
            kind_of(&value)
        )));
    };

    Ok(IntentReply {
        intent: string_field(&fields, KEY_INTENT),
        needs_confirmation: matches!(fields.get(KEY_NEEDS_CONFIRMATION), Some(Value::Bool(true))),
        confirmation_prompt: string_field(&fields, KEY_TTS_CONFIRM),
        command: string_field(&fields, KEY_COMMAND),
    })
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reply() {
        let reply = parse(
            br#"{"intent":"home","needs_confirmation":true,"tts_confirm":"Lock the door?","command":"lock_door"}"#,
        )
        .unwrap();

        assert_eq!(reply.intent.as_deref(), Some("home"));
        assert!(reply.needs_confirmation);
        assert_eq!(reply.confirmation_prompt.as_deref(), Some("Lock the door?"));
        assert_eq!(reply.command.as_deref(), Some("lock_door"));
    }

    #[test]
    fn test_missing_fields_default() {
        let reply = parse(b"{}").unwrap();
        assert_eq!(reply, IntentReply::default());
    }

    #[test]
    fn test_wrong_typed_confirmation_is_false() {
        for body in [
            r#"{"needs_confirmation":"true"}"#,
            r#"{"needs_confirmation":1}"#,
            r#"{"needs_confirmation":null}"#,
            r#"{"needs_confirmation":false}"#,
        ] {
            assert!(!parse_str(body).unwrap().needs_confirmation, "{body}");
        }
    }

    #[test]
    fn test_wrong_typed_strings_are_none() {
        let reply =
            parse_str(r#"{"intent":7,"tts_confirm":["x"],"command":{"op":"lock"}}"#).unwrap();
        assert!(reply.intent.is_none());
        assert!(reply.confirmation_prompt.is_none());
        assert!(reply.command.is_none());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let reply = parse_str(r#"{"command":"x","extra":{"nested":true}}"#).unwrap();
        assert_eq!(reply.command.as_deref(), Some("x"));
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(parse(b""), Err(ParseError::Empty));
        assert_eq!(parse(b"   \n"), Err(ParseError::Empty));
        assert!(matches!(parse(b"{not json"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse(b"[1,2]"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse(b"\"text\""), Err(ParseError::Malformed(_))));
        assert!(matches!(parse(&[0xff, 0xfe, b'{']), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_command_passes_through_verbatim() {
        let payload = r#"{"device":"door","action":"lock"}  "#;
        let body = serde_json::json!({ "needs_confirmation": true, "command": payload });
        let reply = parse_str(&body.to_string()).unwrap();
        assert_eq!(reply.command.as_deref(), Some(payload));
    }
}
