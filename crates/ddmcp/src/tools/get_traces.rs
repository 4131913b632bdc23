use std::collections::BTreeMap;

use ddmcp_client::expand::expand_child_spans;
use ddmcp_client::search::{SpanSearchParams, SpanSource};
use ddmcp_core::error::{DdmcpError, Result};
use ddmcp_core::extract::extract_spans;
use ddmcp_core::model::span::CanonicalSpan;
use ddmcp_core::query::{DEFAULT_LIMIT, MAX_LIMIT, TraceFormat, TracesParams};
use ddmcp_core::time::TimeRange;
use serde_json::{Value, json};

use super::ToolResult;
use crate::render;

/// Tool descriptor advertised over `tools/list`.
pub fn definition() -> Value {
    let ranges: Vec<&str> = TimeRange::ALL.iter().map(|r| r.as_str()).collect();
    json!({
        "name": "get_traces",
        "description": "Search Datadog APM trace spans with filters, free-text queries, cursor pagination, optional expansion to every span of each matched trace, and multiple output formats",
        "inputSchema": {
            "type": "object",
            "properties": {
                "time_range": {
                    "type": "string",
                    "enum": ranges,
                    "default": "1h",
                    "description": "Relative lookback window for the search"
                },
                "filters": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Field filters, e.g. {\"service\": \"web-api\", \"env\": \"prod\"}"
                },
                "query": {
                    "type": "string",
                    "description": "Free-text Datadog search query, ANDed with the filters"
                },
                "limit": {
                    "type": "integer",
                    "default": DEFAULT_LIMIT,
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "description": "Maximum number of spans in the initial page"
                },
                "cursor": {
                    "type": "string",
                    "default": "",
                    "description": "Pagination cursor returned by a previous call"
                },
                "format": {
                    "type": "string",
                    "enum": ["table", "text", "json", "debug", "summary"],
                    "default": "table",
                    "description": "Output format; text switches to a hierarchy view when include_children is set"
                },
                "include_children": {
                    "type": "boolean",
                    "default": false,
                    "description": "Fetch every span of each matched trace, not just the spans that matched"
                }
            },
            "required": []
        }
    })
}

pub async fn handle<S: SpanSource>(
    source: &S,
    max_pages_per_trace: Option<usize>,
    params: TracesParams,
) -> ToolResult {
    match run(source, max_pages_per_trace, &params).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, "get_traces failed");
            ToolResult::error(failure_text(&err, &params))
        }
    }
}

async fn run<S: SpanSource>(
    source: &S,
    max_pages_per_trace: Option<usize>,
    params: &TracesParams,
) -> Result<ToolResult> {
    let search = SpanSearchParams {
        time_range: params.time_range,
        filters: params.filters.clone(),
        query: params.query.clone(),
        limit: params.clamped_limit(),
        cursor: params.cursor().map(str::to_string),
    };
    let page = source.search_spans(&search).await?;
    let next_cursor = page.next_cursor().map(str::to_string);

    let mut events = page.data;
    if params.include_children && !events.is_empty() {
        events = expand_child_spans(source, &events, params.time_range, max_pages_per_trace).await;
    }
    let spans = extract_spans(&events);
    tracing::debug!(
        initial = search.limit,
        spans = spans.len(),
        "extracted canonical spans"
    );

    if spans.is_empty() && (effective_query(params).is_some() || !params.filters.is_empty()) {
        return Ok(ToolResult::ok(no_match_guidance(params)));
    }

    let body = match params.format {
        TraceFormat::Json => return Ok(ToolResult::ok(json_output(&spans, next_cursor)?)),
        TraceFormat::Debug => {
            return Ok(ToolResult::ok(render::format_spans_as_debug(
                &events, &spans,
            )));
        }
        TraceFormat::Summary => render::format_spans_as_summary(&spans),
        TraceFormat::Text if params.include_children => with_cursor(
            render::format_spans_as_hierarchy(&spans),
            next_cursor.as_deref(),
        ),
        TraceFormat::Text => {
            with_cursor(render::format_spans_as_text(&spans), next_cursor.as_deref())
        }
        TraceFormat::Table => with_cursor(
            render::format_spans_as_table(&spans),
            next_cursor.as_deref(),
        ),
    };

    let header = header_line(params, spans.len());
    let rule = "=".repeat(header.chars().count());
    Ok(ToolResult::ok(format!("{header}\n{rule}\n\n{body}")))
}

fn json_output(spans: &[CanonicalSpan], next_cursor: Option<String>) -> Result<String> {
    let has_more = next_cursor.is_some();
    let doc = json!({
        "traces": spans,
        "pagination": {
            "next_cursor": next_cursor,
            "has_more": has_more,
        },
    });
    serde_json::to_string_pretty(&doc)
        .map_err(|e| DdmcpError::Parse(format!("serializing trace output: {e}")))
}

fn header_line(params: &TracesParams, count: usize) -> String {
    let mut header = format!("Time Range: {} | Found: {count} traces", params.time_range);
    if params.cursor().is_some() {
        header.push_str(" (cursor pagination)");
    }
    if !params.filters.is_empty() {
        header.push_str(&format!(" | Filters: {}", filters_line(&params.filters)));
    }
    if let Some(query) = effective_query(params) {
        header.push_str(&format!(" | Query: {query}"));
    }
    header
}

fn with_cursor(body: String, cursor: Option<&str>) -> String {
    match cursor {
        Some(token) => format!("{body}\n\nNext cursor: {token}"),
        None => body,
    }
}

fn no_match_guidance(params: &TracesParams) -> String {
    let mut text = String::from("No traces found with the specified filters.\n");
    if !params.filters.is_empty() {
        text.push_str(&format!("\nFilters: {}", filters_line(&params.filters)));
    }
    if let Some(query) = effective_query(params) {
        text.push_str(&format!("\nQuery: '{query}'"));
    }
    text.push_str(
        "\n\nTry adjusting your filters or query. Common trace fields include:\n\
         - service: service name\n\
         - env: environment (prod, staging, ...)\n\
         - resource_name: endpoint or resource\n\
         - operation_name: span operation\n\
         - status: span status (ok, error)\n\
         - @http.status_code: HTTP status code\n\
         - @http.method: HTTP method",
    );
    text
}

fn failure_text(err: &DdmcpError, params: &TracesParams) -> String {
    let mut text = format!("Error retrieving traces: {err}\n\nQuery parameters:");
    if let Some(query) = effective_query(params) {
        text.push_str(&format!("\n- Query: '{query}'"));
    }
    if !params.filters.is_empty() {
        text.push_str(&format!("\n- Filters: {}", filters_line(&params.filters)));
    }
    text.push_str(&format!("\n- Time range: {}", params.time_range));
    text
}

fn effective_query(params: &TracesParams) -> Option<&str> {
    params.query.as_deref().filter(|q| !q.is_empty())
}

fn filters_line(filters: &BTreeMap<String, String>) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with(filters: &[(&str, &str)], query: Option<&str>) -> TracesParams {
        TracesParams {
            filters: filters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            query: query.map(str::to_string),
            ..TracesParams::default()
        }
    }

    #[test]
    fn header_includes_everything_that_was_asked() {
        let mut params = params_with(&[("service", "web")], Some("status:error"));
        params.cursor = Some("tok".into());
        assert_eq!(
            header_line(&params, 3),
            "Time Range: 1h | Found: 3 traces (cursor pagination) | Filters: service=web | Query: status:error"
        );
    }

    #[test]
    fn header_omits_unset_parts() {
        let params = params_with(&[], None);
        assert_eq!(header_line(&params, 0), "Time Range: 1h | Found: 0 traces");
    }

    #[test]
    fn empty_query_string_counts_as_unset() {
        let params = params_with(&[], Some(""));
        assert_eq!(effective_query(&params), None);
        assert_eq!(header_line(&params, 1), "Time Range: 1h | Found: 1 traces");
    }

    #[test]
    fn failure_text_echoes_the_request() {
        let params = params_with(&[("env", "prod")], Some("status:error"));
        let text = failure_text(
            &DdmcpError::Transport {
                message: "span search returned 403".into(),
                body: None,
            },
            &params,
        );
        assert!(text.starts_with("Error retrieving traces: transport error: span search returned 403"));
        assert!(text.contains("- Query: 'status:error'"));
        assert!(text.contains("- Filters: env=prod"));
        assert!(text.contains("- Time range: 1h"));
    }

    #[test]
    fn guidance_lists_common_fields() {
        let params = params_with(&[("service", "ghost")], None);
        let text = no_match_guidance(&params);
        assert!(text.starts_with("No traces found with the specified filters."));
        assert!(text.contains("Filters: service=ghost"));
        assert!(text.contains("@http.status_code"));
        assert!(text.contains("@http.method"));
    }
}
