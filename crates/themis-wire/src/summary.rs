//! Display summaries for free-form tool payloads
//!
//! Tool inputs and outputs are arbitrary JSON. What a conversation stores is a
//! single line of text: the `command` of an input, the `output` (or `error`) of
//! an output, or the whole payload serialized when none of those is usable.

use serde_json::Value;

/// Summarize a `tool_start` input payload.
pub fn input_summary(input: &Value) -> String {
    truthy_text(input.get("command")).unwrap_or_else(|| whole_payload(input))
}

/// Summarize a `tool_end` output payload.
pub fn output_summary(output: &Value) -> String {
    truthy_text(output.get("output"))
        .or_else(|| truthy_text(output.get("error")))
        .unwrap_or_else(|| whole_payload(output))
}

/// Text for a field, or `None` when the field is absent or empty-ish
/// (null, false, zero, empty string).
fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

fn whole_payload(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
