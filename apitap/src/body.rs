//! Turning response bytes into the value stored on a record.
//!
//! Decoding never fails: anything that cannot be represented degrades to one of the
//! placeholder strings from [`crate::data`].

use crate::data::{DispatchedResponse, UNPARSABLE_RESPONSE_BODY, UNSUPPORTED_RESPONSE_BODY};
use serde_json::Value;

/// Decoding used for promise-style calls: the content type decides between JSON, text
/// and a placeholder for everything else.
pub fn decode_response_body(response: &DispatchedResponse) -> Value {
    let content_type = response.content_type();

    if content_type.contains("application/json") {
        serde_json::from_slice(&response.body)
            .unwrap_or_else(|_| Value::String(UNPARSABLE_RESPONSE_BODY.into()))
    } else if content_type.contains("text/") {
        Value::String(response.text())
    } else {
        Value::String(UNSUPPORTED_RESPONSE_BODY.into())
    }
}

/// Decoding used for event-style calls, which only ever see the response as text.
pub fn decode_event_body(content_type: &str, text: &str) -> Value {
    if !content_type.contains("application/json") {
        return Value::String(text.into());
    }

    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) if text.is_empty() => Value::String(UNPARSABLE_RESPONSE_BODY.into()),
        Err(_) => Value::String(text.into()),
    }
}

/// Body of a mock rule as it appears on the record: parsed JSON when possible.
pub fn decode_mock_body(raw: &str) -> Value {
    let raw = if raw.is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.into()))
}
