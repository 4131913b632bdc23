//! Text renderings of canonical spans for tool output. Every formatter is a
//! pure function over already-extracted spans; none of them touch the network
//! or mutate their input.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ddmcp_core::hierarchy::SpanTree;
use ddmcp_core::model::span::{CanonicalSpan, RawSpanEvent};
use serde_json::{Map, Value, json};

const MAX_RESOURCE_WIDTH: usize = 30;
const MAX_OPERATION_WIDTH: usize = 20;
const MAX_TEXT_ATTRIBUTES: usize = 5;
const MAX_DEBUG_ATTRIBUTES: usize = 30;
const MAX_DEBUG_STRING_LEN: usize = 100;

/// Pipe-delimited table, one row per span. Resource and operation names are
/// truncated so wide resources do not blow out the layout.
pub fn format_spans_as_table(spans: &[CanonicalSpan]) -> String {
    if spans.is_empty() {
        return "No traces found".to_string();
    }

    const HEADERS: [&str; 7] = [
        "Service",
        "Resource",
        "Operation",
        "Duration (ms)",
        "Status",
        "Err",
        "Env",
    ];
    const DURATION_COL: usize = 3;

    let rows: Vec<[String; 7]> = spans
        .iter()
        .map(|s| {
            [
                s.service.clone(),
                truncate(&s.resource_name, MAX_RESOURCE_WIDTH),
                truncate(&s.operation_name, MAX_OPERATION_WIDTH),
                format!("{:.2}", s.duration_ms),
                s.status.clone(),
                if s.error { "ERR".to_string() } else { String::new() },
                s.env.clone(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = HEADERS
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect();
    lines.push(format!("| {} |", header.join(" | ")));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(format!("|-{}-|", rule.join("-|-")));
    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                if i == DURATION_COL {
                    format!("{cell:>w$}")
                } else {
                    format!("{cell:<w$}")
                }
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Numbered multi-line blocks, one per span, with up to five custom
/// attributes shown verbatim.
pub fn format_spans_as_text(spans: &[CanonicalSpan]) -> String {
    if spans.is_empty() {
        return "No trace spans to display".to_string();
    }

    let blocks: Vec<String> = spans
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut lines = vec![
                format!("{}. Trace: {}", i + 1, s.trace_id),
                format!(
                    "   Span: {} (parent: {})",
                    s.span_id,
                    s.parent_id.as_deref().filter(|p| !p.is_empty()).unwrap_or("none")
                ),
                format!("   Service: {}", s.service),
                format!("   Resource: {}", s.resource_name),
                format!("   Operation: {}", s.operation_name),
                format!("   Duration: {:.2}ms", s.duration_ms),
                format!(
                    "   Status: {}{}",
                    s.status,
                    if s.error { " [ERROR]" } else { "" }
                ),
                format!("   Env: {}", s.env),
            ];
            for (key, value) in s.custom_attributes.iter().take(MAX_TEXT_ATTRIBUTES) {
                lines.push(format!("   {key}: {}", display_value(value)));
            }
            let hidden = s.custom_attributes.len().saturating_sub(MAX_TEXT_ATTRIBUTES);
            if hidden > 0 {
                lines.push(format!("   ... and {hidden} more attributes"));
            }
            lines.join("\n")
        })
        .collect();
    blocks.join("\n\n")
}

/// Indented tree per root span. Roots are labelled by resource name and
/// service, children by operation name; every node carries its duration and
/// status.
pub fn format_spans_as_hierarchy(spans: &[CanonicalSpan]) -> String {
    if spans.is_empty() {
        return "No spans to build a hierarchy from".to_string();
    }

    let tree = SpanTree::build(spans);
    let mut out = String::new();
    for root in &tree.roots {
        render_tree_node(&tree, root, 0, true, &mut out);
    }
    out.trim_end().to_string()
}

fn render_tree_node(
    tree: &SpanTree,
    span: &CanonicalSpan,
    depth: usize,
    is_root: bool,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    let label = if is_root {
        let name = non_empty(&span.resource_name)
            .or_else(|| non_empty(&span.operation_name))
            .unwrap_or(&span.span_id);
        format!("{name} [{}]", span.service)
    } else {
        non_empty(&span.operation_name)
            .or_else(|| non_empty(&span.resource_name))
            .unwrap_or(&span.span_id)
            .to_string()
    };
    let error = if span.error { ", ERROR" } else { "" };
    out.push_str(&format!(
        "{indent}\u{2514}\u{2500} {label} ({:.2}ms, {}{error})\n",
        span.duration_ms, span.status
    ));
    for child in tree.children_of(&span.span_id) {
        render_tree_node(tree, child, depth + 1, false, out);
    }
}

/// Per-trace digest: span count, root identification, operation breakdown,
/// and the slowest spans, each scoped to one trace.
pub fn format_spans_as_summary(spans: &[CanonicalSpan]) -> String {
    if spans.is_empty() {
        return "No trace data to summarize".to_string();
    }

    let mut trace_order: Vec<&str> = Vec::new();
    let mut traces: HashMap<&str, Vec<&CanonicalSpan>> = HashMap::new();
    for span in spans {
        traces
            .entry(span.trace_id.as_str())
            .or_insert_with(|| {
                trace_order.push(span.trace_id.as_str());
                Vec::new()
            })
            .push(span);
    }

    let mut out = String::new();
    out.push_str(&format!("Total spans: {}\n", spans.len()));
    out.push_str(&format!("Unique traces: {}\n", trace_order.len()));

    for trace_id in &trace_order {
        let members = &traces[trace_id];
        out.push_str(&format!("\nTrace: {}...\n", truncate_raw(trace_id, 16)));
        out.push_str(&format!("  Total spans: {}\n", members.len()));
        if let Some(root) = first_root(members) {
            out.push_str(&format!("  Root operation: {}\n", root.operation_name));
            out.push_str(&format!("  Total duration: {:.2}ms\n", root.duration_ms));
            out.push_str(&format!("  Service: {}\n", root.service));
            out.push_str(&format!("  Resource: {}\n", root.resource_name));
            out.push_str(&format!("  Status: {}\n", root.status));
            if root.error {
                out.push_str("  Error: yes\n");
            }
        }

        out.push_str("  Span breakdown:\n");
        for (name, count) in operation_breakdown(members).iter().take(10) {
            out.push_str(&format!("    {name}: {count}\n"));
        }

        let mut slowest: Vec<&CanonicalSpan> = members.to_vec();
        slowest.sort_by(|a, b| {
            b.duration_ms
                .partial_cmp(&a.duration_ms)
                .unwrap_or(Ordering::Equal)
        });
        out.push_str("  Top 5 slowest spans:\n");
        for span in slowest.iter().take(5) {
            let operation = non_empty(&span.operation_name).unwrap_or("unknown");
            out.push_str(&format!(
                "    {:.2}ms - {operation} - {}\n",
                span.duration_ms,
                truncate_raw(&span.resource_name, 50)
            ));
        }
    }

    out.trim_end().to_string()
}

fn operation_breakdown<'a>(members: &[&'a CanonicalSpan]) -> Vec<(&'a str, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for span in members {
        let name = non_empty(&span.operation_name).unwrap_or("unknown");
        let count = counts.entry(name).or_insert_with(|| {
            order.push(name);
            0
        });
        *count += 1;
    }
    let mut breakdown: Vec<(&str, usize)> = order.iter().map(|name| (*name, counts[name])).collect();
    // Stable sort keeps first-seen order among equal counts.
    breakdown.sort_by(|a, b| b.1.cmp(&a.1));
    breakdown
}

/// Introspection report over the first raw event, for diagnosing extraction
/// against whatever shape the API actually returned.
pub fn format_spans_as_debug(events: &[RawSpanEvent], spans: &[CanonicalSpan]) -> String {
    let Some(event) = events.first() else {
        return "No raw events to inspect".to_string();
    };

    let mut keys: Vec<&str> = event.attributes.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let mut timestamp_fields = Map::new();
    let mut duration_fields = Map::new();
    for (key, value) in &event.attributes {
        let lower = key.to_lowercase();
        if lower.contains("time") || lower.contains("start") {
            timestamp_fields.insert(key.clone(), value.clone());
        }
        if lower.contains("duration") {
            duration_fields.insert(key.clone(), value.clone());
        }
    }

    let selected: Map<String, Value> = event
        .attributes
        .iter()
        .take(MAX_DEBUG_ATTRIBUTES)
        .map(|(key, value)| (key.clone(), preview_value(value)))
        .collect();

    let report = json!({
        "total_events": events.len(),
        "sample_event": {
            "id": event.id,
            "type": event.kind,
            "total_attributes": event.attributes.len(),
            "attribute_keys": keys,
            "timestamp_fields": timestamp_fields,
            "duration_fields": duration_fields,
            "selected_attributes": selected,
        },
        "extracted_span": spans.first(),
    });
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "debug report unavailable".to_string())
}

/// `1234567` renders as `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn first_root<'a>(members: &[&'a CanonicalSpan]) -> Option<&'a CanonicalSpan> {
    let ids: HashSet<&str> = members.iter().map(|s| s.span_id.as_str()).collect();
    members
        .iter()
        .copied()
        .find(|s| !s.has_parent() || !ids.contains(s.parent_id.as_deref().unwrap_or("")))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", truncate_raw(s, max.saturating_sub(3)))
    }
}

fn truncate_raw(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_DEBUG_STRING_LEN => {
            json!(format!("{}...", truncate_raw(s, MAX_DEBUG_STRING_LEN)))
        }
        Value::Object(map) => json!(format!("<object with {} keys>", map.len())),
        Value::Array(items) => json!(format!("<array with {} items>", items.len())),
        other => other.clone(),
    }
}
