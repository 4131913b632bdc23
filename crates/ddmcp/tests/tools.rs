//! End-to-end tool handler tests against scripted API backends.

use ddmcp::tools::{aggregate_traces, get_traces};
use ddmcp_core::error::DdmcpError;
use ddmcp_core::query::{AggregateFormat, AggregateParams, TraceFormat, TracesParams};
use serde_json::{Value, json};
use testkit::{ScriptedAggregates, ScriptedSpans, aggregate_buckets, page, raw_span, sample_trace_events};

fn traces_params(format: TraceFormat) -> TracesParams {
    TracesParams {
        format,
        ..TracesParams::default()
    }
}

#[tokio::test]
async fn table_output_renders_matched_spans() {
    let events = vec![raw_span(
        "t1",
        "s1",
        None,
        "web",
        "GET /x",
        "http.request",
        2_000_000,
    )];
    let source = ScriptedSpans::new(vec![Ok(page(events, None))]);

    let result = get_traces::handle(&source, None, traces_params(TraceFormat::Table)).await;

    assert!(!result.is_error);
    let lines: Vec<&str> = result.text.lines().collect();
    assert_eq!(lines[0], "Time Range: 1h | Found: 1 traces");
    assert_eq!(lines[1], "=".repeat(lines[0].len()));
    assert!(result.text.contains("web"));
    assert!(result.text.contains("GET /x"));
    assert!(result.text.contains("http.request"));
    assert!(result.text.contains("2.00"));
    assert!(result.text.contains(" ok "));
    assert!(!result.text.contains("ERR"));
    assert!(!result.text.contains("Next cursor:"));
}

#[tokio::test]
async fn json_output_round_trips_spans_in_order() {
    let source = ScriptedSpans::new(vec![Ok(page(sample_trace_events("t1"), Some("tok")))]);

    let result = get_traces::handle(&source, None, traces_params(TraceFormat::Json)).await;

    assert!(!result.is_error);
    let doc: Value = serde_json::from_str(&result.text).unwrap();
    let traces = doc["traces"].as_array().unwrap();
    assert_eq!(traces.len(), 4);
    let ids: Vec<&str> = traces
        .iter()
        .map(|t| t["span_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["root", "mw", "db1", "db2"]);
    assert_eq!(traces[0]["duration_ms"], json!(120.0));
    assert_eq!(doc["pagination"]["next_cursor"], json!("tok"));
    assert_eq!(doc["pagination"]["has_more"], json!(true));
    // JSON output carries pagination structurally, never as trailing text.
    assert!(!result.text.contains("Time Range:"));
}

#[tokio::test]
async fn include_children_expands_traces_across_pages() {
    let all = sample_trace_events("t1");
    let source = ScriptedSpans::new(vec![
        // The filtered search matched only the root span.
        Ok(page(vec![all[0].clone()], None)),
        // Expansion pulls the full trace over two pages.
        Ok(page(all[..3].to_vec(), Some("next"))),
        Ok(page(all[3..].to_vec(), None)),
    ]);

    let params = TracesParams {
        include_children: true,
        format: TraceFormat::Text,
        ..TracesParams::default()
    };
    let result = get_traces::handle(&source, None, params).await;

    assert!(!result.is_error);
    assert!(result.text.contains("Found: 4 traces"));
    // include_children switches text output to the hierarchy view.
    assert!(result.text.contains("└─ GET /api/orders [web]"));
    assert!(result.text.contains("  └─ middleware"));

    let calls = source.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].query.as_deref(), Some("trace_id:t1"));
    assert_eq!(calls[2].cursor.as_deref(), Some("next"));
}

#[tokio::test]
async fn cursor_request_is_labelled_and_next_cursor_is_surfaced() {
    let source = ScriptedSpans::new(vec![Ok(page(sample_trace_events("t1"), Some("page2")))]);

    let params = TracesParams {
        cursor: Some("page1".into()),
        ..TracesParams::default()
    };
    let result = get_traces::handle(&source, None, params).await;

    assert!(result.text.contains("(cursor pagination)"));
    assert!(result.text.ends_with("Next cursor: page2"));
    assert_eq!(source.calls()[0].cursor.as_deref(), Some("page1"));
}

#[tokio::test]
async fn no_matches_with_filters_returns_guidance() {
    let source = ScriptedSpans::new(vec![Ok(page(Vec::new(), None))]);

    let params = TracesParams {
        filters: [("service".to_string(), "ghost".to_string())].into(),
        ..TracesParams::default()
    };
    let result = get_traces::handle(&source, None, params).await;

    assert!(!result.is_error);
    assert!(result.text.starts_with("No traces found with the specified filters."));
    assert!(result.text.contains("Filters: service=ghost"));
    assert!(result.text.contains("- @http.method"));
}

#[tokio::test]
async fn unfiltered_empty_result_renders_the_empty_table() {
    let source = ScriptedSpans::new(vec![Ok(page(Vec::new(), None))]);

    let result = get_traces::handle(&source, None, traces_params(TraceFormat::Table)).await;

    assert!(!result.is_error);
    assert!(result.text.contains("Found: 0 traces"));
    assert!(result.text.contains("No traces found"));
}

#[tokio::test]
async fn transport_failure_is_flagged_with_the_request_echoed() {
    let source = ScriptedSpans::new(vec![Err(DdmcpError::Transport {
        message: "span search returned 403 Forbidden".into(),
        body: Some("{\"errors\":[\"forbidden\"]}".into()),
    })]);

    let params = TracesParams {
        query: Some("status:error".into()),
        ..TracesParams::default()
    };
    let result = get_traces::handle(&source, None, params).await;

    assert!(result.is_error);
    assert!(result.text.starts_with("Error retrieving traces:"));
    assert!(result.text.contains("403 Forbidden"));
    assert!(result.text.contains("- Query: 'status:error'"));
    assert!(result.text.contains("- Time range: 1h"));
}

#[tokio::test]
async fn summary_format_keeps_the_header_and_digest() {
    let source = ScriptedSpans::new(vec![Ok(page(sample_trace_events("t1"), None))]);

    let result = get_traces::handle(&source, None, traces_params(TraceFormat::Summary)).await;

    assert!(result.text.starts_with("Time Range: 1h | Found: 4 traces"));
    assert!(result.text.contains("Unique traces: 1"));
    assert!(result.text.contains("Root operation: http.request"));
    assert!(result.text.contains("Top 5 slowest spans:"));
}

#[tokio::test]
async fn debug_format_is_raw_json_without_a_header() {
    let source = ScriptedSpans::new(vec![Ok(page(sample_trace_events("t1"), None))]);

    let result = get_traces::handle(&source, None, traces_params(TraceFormat::Debug)).await;

    let doc: Value = serde_json::from_str(&result.text).unwrap();
    assert_eq!(doc["total_events"], json!(4));
    assert_eq!(doc["extracted_span"]["service"], json!("web"));
}

#[tokio::test]
async fn aggregate_table_reports_buckets_and_total() {
    let aggregator = ScriptedAggregates::new(vec![Ok(aggregate_buckets(&[
        (&[("service", "web")], 1500),
        (&[("service", "worker")], 22),
    ]))]);

    let params = AggregateParams {
        group_by: vec!["service".into()],
        ..AggregateParams::default()
    };
    let result = aggregate_traces::handle(&aggregator, params).await;

    assert!(!result.is_error);
    assert!(result.text.contains("service | COUNT"));
    assert!(result.text.contains("web | 1,500"));
    assert!(result.text.contains("worker | 22"));
    assert!(result.text.contains("TOTAL: 1,522 traces"));
}

#[tokio::test]
async fn aggregate_failure_is_flagged_with_the_request_echoed() {
    let aggregator = ScriptedAggregates::new(vec![Err(DdmcpError::Transport {
        message: "span aggregation returned 500".into(),
        body: None,
    })]);

    let params = AggregateParams {
        group_by: vec!["env".into()],
        ..AggregateParams::default()
    };
    let result = aggregate_traces::handle(&aggregator, params).await;

    assert!(result.is_error);
    assert!(result.text.starts_with("Error aggregating traces:"));
    assert!(result.text.contains("- Group by: env"));
}
