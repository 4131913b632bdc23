use std::collections::BTreeMap;

use ddmcp_client::aggregate::{SpanAggregateParams, SpanAggregator};
use ddmcp_core::error::{DdmcpError, Result};
use ddmcp_core::model::aggregate::AggregatePage;
use ddmcp_core::query::{AggregateFormat, AggregateParams};
use serde_json::{Value, json};

use super::ToolResult;
use crate::render::group_thousands;

/// Tool descriptor advertised over `tools/list`. Aggregations are heavier
/// upstream than searches, so the advertised windows stop at 30 days.
pub fn definition() -> Value {
    json!({
        "name": "aggregate_traces",
        "description": "Count Datadog APM trace spans, optionally grouped by fields such as service or env",
        "inputSchema": {
            "type": "object",
            "properties": {
                "time_range": {
                    "type": "string",
                    "enum": ["1h", "4h", "8h", "1d", "7d", "14d", "30d"],
                    "default": "1h",
                    "description": "Relative lookback window for the aggregation"
                },
                "filters": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Field filters, e.g. {\"service\": \"web-api\"}"
                },
                "query": {
                    "type": "string",
                    "description": "Free-text Datadog search query, ANDed with the filters"
                },
                "group_by": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Fields to group counts by, e.g. [\"service\", \"env\"]"
                },
                "format": {
                    "type": "string",
                    "enum": ["table", "json", "summary"],
                    "default": "table"
                }
            },
            "required": []
        }
    })
}

pub async fn handle<A: SpanAggregator>(aggregator: &A, params: AggregateParams) -> ToolResult {
    match run(aggregator, &params).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, "aggregate_traces failed");
            ToolResult::error(failure_text(&err, &params))
        }
    }
}

async fn run<A: SpanAggregator>(aggregator: &A, params: &AggregateParams) -> Result<ToolResult> {
    let request = SpanAggregateParams {
        time_range: params.time_range,
        filters: params.filters.clone(),
        query: params.query.clone(),
        group_by: params.group_by.clone(),
    };
    let page = aggregator.aggregate_spans(&request).await?;

    let text = match params.format {
        AggregateFormat::Json => serde_json::to_string_pretty(&page)
            .map_err(|e| DdmcpError::Parse(format!("serializing aggregation output: {e}")))?,
        AggregateFormat::Summary => summary_text(params, &page),
        AggregateFormat::Table => table_text(params, &page),
    };
    Ok(ToolResult::ok(text))
}

fn table_text(params: &AggregateParams, page: &AggregatePage) -> String {
    let total: u64 = page.data.iter().map(|b| b.count()).sum();
    let title = title_line(params);
    let rule = "=".repeat(title.chars().count());

    if params.group_by.is_empty() {
        return format!(
            "{title}\n{rule}\n\nTotal trace count: {}",
            group_thousands(total)
        );
    }

    let header = format!("{} | COUNT", params.group_by.join(" | "));
    let divider = "-".repeat(header.chars().count());
    let mut lines = vec![title, rule, String::new(), header, divider.clone()];
    for bucket in &page.data {
        let groups: Vec<String> = params
            .group_by
            .iter()
            .map(|facet| bucket.group_value(facet))
            .collect();
        lines.push(format!(
            "{} | {}",
            groups.join(" | "),
            group_thousands(bucket.count())
        ));
    }
    lines.push(divider);
    lines.push(format!("TOTAL: {} traces", group_thousands(total)));
    lines.join("\n")
}

fn summary_text(params: &AggregateParams, page: &AggregatePage) -> String {
    let total: u64 = page.data.iter().map(|b| b.count()).sum();
    let mut out = format!(
        "Total traces: {}\nTime range: {}\n",
        group_thousands(total),
        params.time_range
    );
    if !params.group_by.is_empty() {
        out.push_str(&format!(
            "Groups: {} (by {})\n",
            page.data.len(),
            params.group_by.join(", ")
        ));
        let mut buckets: Vec<_> = page.data.iter().collect();
        buckets.sort_by(|a, b| b.count().cmp(&a.count()));
        out.push_str("Top groups:\n");
        for bucket in buckets.iter().take(5) {
            let groups: Vec<String> = params
                .group_by
                .iter()
                .map(|facet| bucket.group_value(facet))
                .collect();
            out.push_str(&format!(
                "  {}: {}\n",
                groups.join(" | "),
                group_thousands(bucket.count())
            ));
        }
    }
    out.trim_end().to_string()
}

fn title_line(params: &AggregateParams) -> String {
    let mut title = format!("Time Range: {}", params.time_range);
    if let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) {
        title.push_str(&format!(" | Query: {query}"));
    }
    if !params.filters.is_empty() {
        title.push_str(&format!(" | Filters: {}", filters_line(&params.filters)));
    }
    title
}

fn failure_text(err: &DdmcpError, params: &AggregateParams) -> String {
    let mut text = format!("Error aggregating traces: {err}\n\nQuery parameters:");
    if let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) {
        text.push_str(&format!("\n- Query: '{query}'"));
    }
    if !params.filters.is_empty() {
        text.push_str(&format!("\n- Filters: {}", filters_line(&params.filters)));
    }
    if !params.group_by.is_empty() {
        text.push_str(&format!("\n- Group by: {}", params.group_by.join(", ")));
    }
    text.push_str(&format!("\n- Time range: {}", params.time_range));
    text
}

fn filters_line(filters: &BTreeMap<String, String>) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
