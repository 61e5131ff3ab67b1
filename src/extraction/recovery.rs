//! Two-tier JSON recovery for model output.
//!
//! 1. Parse the whole response as a JSON object.
//! 2. Otherwise parse the span from the first `{` to the last `}`, which
//!    strips prose and code fences around the payload.
//!
//! Anything else is an `ExtractionError::Parse` carrying the raw text.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ExtractionError;

/// A recovered JSON object.
pub type JsonObject = Map<String, Value>;

/// Recover exactly one JSON object from free-form model output.
pub fn recover_json_object(raw: &str) -> Result<JsonObject, ExtractionError> {
    let trimmed = raw.trim();

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(obj);
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(parse_error(raw, "no JSON object delimiters found"));
    };
    if end <= start {
        return Err(parse_error(raw, "closing brace precedes opening brace"));
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(obj)) => {
            debug!(
                leading = start,
                trailing = trimmed.len() - end - 1,
                "Recovered JSON object from surrounding text"
            );
            Ok(obj)
        }
        Ok(_) => Err(parse_error(raw, "embedded value is not an object")),
        Err(e) => Err(parse_error(raw, &format!("JSON parse error: {e}"))),
    }
}

fn parse_error(raw: &str, reason: &str) -> ExtractionError {
    ExtractionError::Parse {
        payload: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_parses_directly() {
        let obj = recover_json_object(r#"{"totalPrice": 100}"#).unwrap();
        assert_eq!(obj["totalPrice"], 100);
    }

    #[test]
    fn object_inside_prose_and_fence() {
        let raw = "Sure! ```json {\"totalPrice\": 100} ``` Thanks";
        let obj = recover_json_object(raw).unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["totalPrice"], 100);
    }

    #[test]
    fn nested_objects_use_outermost_braces() {
        let raw = "Here you go:\n{\"items\": [{\"name\": \"Desk\", \"qty\": 2}], \"currency\": \"EUR\"}\nLet me know.";
        let obj = recover_json_object(raw).unwrap();
        assert_eq!(obj["currency"], "EUR");
        assert_eq!(obj["items"][0]["name"], "Desk");
    }

    #[test]
    fn no_braces_is_parse_error() {
        let err = recover_json_object("I could not find any pricing.").unwrap_err();
        match err {
            ExtractionError::Parse { payload, .. } => {
                assert_eq!(payload, "I could not find any pricing.");
            }
            other => panic!("Expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn reversed_braces_is_parse_error() {
        assert!(matches!(
            recover_json_object("} oops {"),
            Err(ExtractionError::Parse { .. })
        ));
    }

    #[test]
    fn broken_json_between_braces_is_parse_error() {
        assert!(matches!(
            recover_json_object("result: {\"totalPrice\": 100,, } end"),
            Err(ExtractionError::Parse { .. })
        ));
    }

    #[test]
    fn top_level_array_is_not_an_object() {
        assert!(recover_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn empty_input_is_parse_error() {
        assert!(matches!(recover_json_object(""), Err(ExtractionError::Parse { .. })));
    }
}
