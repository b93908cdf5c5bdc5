//! Tolerant decoding of oracle replies.
//!
//! Reasoning services wrap their JSON in prose, code fences and whatever
//! else; callers only ever see a tagged result. Decoding never fails.

use serde_json::Value;

/// Outcome of decoding one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// A structured object extracted from the reply text.
    Object(Value),
    /// No decodable object was found; the reply text is kept verbatim.
    Raw(String),
}

impl OracleReply {
    /// The decoded object, or the raw text wrapped as
    /// `{"raw_response": <text>}`.
    pub fn into_value(self) -> Value {
        match self {
            OracleReply::Object(value) => value,
            OracleReply::Raw(text) => serde_json::json!({ "raw_response": text }),
        }
    }

    /// The decoded object, when there is one.
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            OracleReply::Object(value) => Some(value),
            OracleReply::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, OracleReply::Raw(_))
    }
}

/// Decode a reply by extracting the first balanced `{...}` substring and
/// parsing it. Anything else comes back as [`OracleReply::Raw`].
pub fn decode_reply(text: &str) -> OracleReply {
    if let Some(candidate) = extract_balanced(text, '{', '}') {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.is_object() {
                return OracleReply::Object(value);
            }
        }
    }
    OracleReply::Raw(text.to_string())
}

/// Extract and parse the first balanced `[...]` substring. Plan replies
/// arrive as top-level arrays; everything else should use [`decode_reply`].
pub fn decode_array(text: &str) -> Option<Value> {
    let candidate = extract_balanced(text, '[', ']')?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_array() => Some(value),
        _ => None,
    }
}

/// First balanced `open`..`close` substring of `text`.
///
/// The scan is string-aware: delimiters inside JSON string literals
/// (including escaped quotes) do not open or close a region. An opener that
/// never closes is not balanced; the scan restarts at the next opener.
fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(open) {
        let start = search_from + found;
        if let Some(len) = balanced_len(&text[start..], open, close) {
            return Some(&text[start..start + len]);
        }
        search_from = start + open.len_utf8();
    }
    None
}

/// Length of the balanced region starting at the first character of `text`,
/// which must be `open`.
fn balanced_len(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx + ch.len_utf8());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object_decodes() {
        let reply = decode_reply(r#"{"status": "ok", "count": 2}"#);
        assert_eq!(reply, OracleReply::Object(json!({"status": "ok", "count": 2})));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let reply = decode_reply("Sure, here you go:\n{\"a\": 1}\nLet me know!");
        assert_eq!(reply, OracleReply::Object(json!({"a": 1})));
    }

    #[test]
    fn test_nested_objects_stay_balanced() {
        let reply = decode_reply(r#"result: {"outer": {"inner": [1, 2]}} trailing"#);
        assert_eq!(reply, OracleReply::Object(json!({"outer": {"inner": [1, 2]}})));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let reply = decode_reply(r#"{"note": "see {section}", "quote": "a \" b }"}"#);
        let value = reply.as_object().cloned().unwrap();
        assert_eq!(value["note"], "see {section}");
        assert_eq!(value["quote"], "a \" b }");
    }

    #[test]
    fn test_unparseable_text_is_raw() {
        let reply = decode_reply("no structure here at all");
        assert!(reply.is_raw());
        assert_eq!(
            reply.into_value(),
            json!({"raw_response": "no structure here at all"})
        );
    }

    #[test]
    fn test_unbalanced_then_balanced_object() {
        // The first opener never closes; the scan moves on to the next one.
        let reply = decode_reply(r#"{ oops {"a": 1}"#);
        assert_eq!(reply, OracleReply::Object(json!({"a": 1})));
    }

    #[test]
    fn test_balanced_but_invalid_json_is_raw() {
        let reply = decode_reply("{not valid json}");
        assert!(reply.is_raw());
    }

    #[test]
    fn test_array_extraction() {
        let value = decode_array("steps below\n[{\"step_id\": \"a\"}, {\"step_id\": \"b\"}]").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_array_extraction_requires_array() {
        assert!(decode_array("nothing here").is_none());
        assert!(decode_array("{\"steps\": 1}").is_none());
    }
}
