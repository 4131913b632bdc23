use std::collections::VecDeque;
use std::sync::Mutex;

use ddmcp_client::aggregate::{SpanAggregateParams, SpanAggregator};
use ddmcp_client::search::{SpanSearchParams, SpanSource};
use ddmcp_core::error::Result;
use ddmcp_core::model::aggregate::AggregatePage;
use ddmcp_core::model::span::{PageMeta, PagePosition, RawSpanEvent, SpansPage};
use serde_json::json;

/// Builds a raw span event the way the spans search endpoint returns it.
pub fn raw_span(
    trace_id: &str,
    span_id: &str,
    parent_id: Option<&str>,
    service: &str,
    resource: &str,
    operation: &str,
    duration_ns: u64,
) -> RawSpanEvent {
    let mut attributes = json!({
        "trace_id": trace_id,
        "span_id": span_id,
        "service": service,
        "resource_name": resource,
        "operation_name": operation,
        "duration": duration_ns,
        "status": "ok",
        "error": 0,
        "env": "prod",
        "start_timestamp": "2026-02-01T00:00:00Z",
    });
    if let Some(parent) = parent_id {
        attributes["parent_id"] = json!(parent);
    }

    serde_json::from_value(json!({
        "id": span_id,
        "type": "spans",
        "attributes": attributes,
    }))
    .unwrap()
}

/// A small web trace: an HTTP root with a middleware child and two database
/// grandchildren.
pub fn sample_trace_events(trace_id: &str) -> Vec<RawSpanEvent> {
    vec![
        raw_span(
            trace_id,
            "root",
            None,
            "web",
            "GET /api/orders",
            "http.request",
            120_000_000,
        ),
        raw_span(
            trace_id,
            "mw",
            Some("root"),
            "web",
            "auth.middleware",
            "middleware",
            15_000_000,
        ),
        raw_span(
            trace_id,
            "db1",
            Some("mw"),
            "postgres",
            "SELECT orders",
            "db.query",
            40_000_000,
        ),
        raw_span(
            trace_id,
            "db2",
            Some("mw"),
            "postgres",
            "SELECT customers",
            "db.query",
            25_000_000,
        ),
    ]
}

pub fn page(spans: Vec<RawSpanEvent>, after: Option<&str>) -> SpansPage {
    SpansPage {
        data: spans,
        meta: PageMeta {
            page: PagePosition {
                after: after.map(str::to_string),
            },
        },
    }
}

/// Span source that replays a scripted sequence of pages and records every
/// request it saw. Once the script is exhausted it returns empty pages.
pub struct ScriptedSpans {
    pages: Mutex<VecDeque<Result<SpansPage>>>,
    calls: Mutex<Vec<SpanSearchParams>>,
}

impl ScriptedSpans {
    pub fn new(pages: Vec<Result<SpansPage>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SpanSearchParams> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpanSource for ScriptedSpans {
    async fn search_spans(&self, params: &SpanSearchParams) -> Result<SpansPage> {
        self.calls.lock().unwrap().push(params.clone());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SpansPage::default()))
    }
}

/// Scripted counterpart of [`ScriptedSpans`] for the aggregation endpoint.
pub struct ScriptedAggregates {
    pages: Mutex<VecDeque<Result<AggregatePage>>>,
}

impl ScriptedAggregates {
    pub fn new(pages: Vec<Result<AggregatePage>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
        }
    }
}

impl SpanAggregator for ScriptedAggregates {
    async fn aggregate_spans(&self, _params: &SpanAggregateParams) -> Result<AggregatePage> {
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AggregatePage::default()))
    }
}

/// Aggregation buckets as the analytics endpoint returns them.
pub fn aggregate_buckets(rows: &[(&[(&str, &str)], u64)]) -> AggregatePage {
    let data = rows
        .iter()
        .map(|(by, count)| {
            let by: serde_json::Map<String, serde_json::Value> = by
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            serde_json::from_value(json!({
                "attributes": { "by": by, "compute": { "c0": count } },
            }))
            .unwrap()
        })
        .collect();
    AggregatePage { data }
}
