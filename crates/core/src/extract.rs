use chrono::DateTime;
use serde_json::{Map, Value};

use crate::model::span::{CanonicalSpan, RawSpanEvent};

/// Normalizes raw span events into canonical spans. Pure and
/// order-preserving: one output per input, independent of every other input.
pub fn extract_spans(events: &[RawSpanEvent]) -> Vec<CanonicalSpan> {
    events.iter().map(extract_span).collect()
}

fn extract_span(event: &RawSpanEvent) -> CanonicalSpan {
    let attrs = &event.attributes;
    let duration_ns = derive_duration_ns(attrs);

    CanonicalSpan {
        trace_id: string_attr(attrs, "trace_id"),
        span_id: string_attr(attrs, "span_id"),
        parent_id: attrs
            .get("parent_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        service: string_attr(attrs, "service"),
        resource_name: string_attr(attrs, "resource_name"),
        operation_name: string_attr(attrs, "operation_name"),
        duration_ns,
        duration_ms: duration_ms_of(duration_ns),
        start_timestamp: attrs.get("start_timestamp").cloned().unwrap_or(Value::Null),
        status: string_attr(attrs, "status"),
        env: string_attr(attrs, "env"),
        error: attrs.get("error").map(is_truthy).unwrap_or(false),
        custom_attributes: custom_attributes(attrs),
    }
}

/// Invariant: `duration_ms` is always `duration_ns / 1e6` rounded to two
/// decimals.
pub fn duration_ms_of(duration_ns: u64) -> f64 {
    (duration_ns as f64 / 1_000_000.0 * 100.0).round() / 100.0
}

/// Duration priority: explicit nonzero `duration` attribute, then
/// `end_timestamp - start_timestamp` when both parse as RFC 3339, then 0.
/// Malformed values never fail extraction.
fn derive_duration_ns(attrs: &Map<String, Value>) -> u64 {
    if let Some(explicit) = attrs.get("duration").and_then(numeric_u64) {
        if explicit > 0 {
            return explicit;
        }
    }

    let (Some(start), Some(end)) = (
        attrs.get("start_timestamp").and_then(Value::as_str),
        attrs.get("end_timestamp").and_then(Value::as_str),
    ) else {
        return 0;
    };

    match (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    ) {
        (Ok(start), Ok(end)) => (end - start).num_nanoseconds().unwrap_or(0).max(0) as u64,
        _ => 0,
    }
}

fn numeric_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
}

fn string_attr(attrs: &Map<String, Value>, key: &str) -> String {
    attrs
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Every `@`-prefixed attribute is a user-defined tag; copy it verbatim with
/// no type coercion.
fn custom_attributes(attrs: &Map<String, Value>) -> Map<String, Value> {
    attrs
        .iter()
        .filter(|(key, _)| key.starts_with('@'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
