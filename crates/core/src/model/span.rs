use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One span event exactly as returned by the spans search endpoint. The
/// attribute bag is kept untyped so new upstream fields survive without a
/// schema change; only the extractor interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSpanEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RawSpanEvent {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// One page of a spans search, with the continuation cursor from
/// `meta.page.after`. An absent cursor means the result set is exhausted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpansPage {
    #[serde(default)]
    pub data: Vec<RawSpanEvent>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl SpansPage {
    pub fn next_cursor(&self) -> Option<&str> {
        self.meta.page.after.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageMeta {
    #[serde(default)]
    pub page: PagePosition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PagePosition {
    #[serde(default)]
    pub after: Option<String>,
}

/// The normalized span record every renderer consumes. Built once per raw
/// event by the extractor and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub service: String,
    pub resource_name: String,
    pub operation_name: String,
    pub duration_ns: u64,
    pub duration_ms: f64,
    pub start_timestamp: Value,
    pub status: String,
    pub env: String,
    pub error: bool,
    pub custom_attributes: Map<String, Value>,
}

impl CanonicalSpan {
    /// A parent id of `"0"` is the tracing system's encoding for "no
    /// parent", same as an absent field.
    pub fn has_parent(&self) -> bool {
        matches!(&self.parent_id, Some(p) if !p.is_empty() && p != "0")
    }
}
