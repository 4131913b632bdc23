use std::collections::HashSet;

use ddmcp_core::model::span::RawSpanEvent;
use ddmcp_core::time::TimeRange;

use crate::search::{SpanSearchParams, SpanSource};

/// Fetches the full span set for every distinct trace id present in the
/// initial page, following the cursor until the API stops returning one.
///
/// Each trace is expanded exactly once no matter how many of its spans
/// appeared in the input. A span with no trace id, whose first child fetch
/// fails or comes back empty, or whose expansion is capped before any page
/// was fetched, is passed through unchanged rather than dropped; a failure
/// on one trace never disturbs the spans already accumulated for the others.
///
/// Without `max_pages_per_trace` the page loop is unbounded: a pathological
/// trace runs until the upstream cursor terminates.
pub async fn expand_child_spans<S: SpanSource>(
    source: &S,
    initial: &[RawSpanEvent],
    time_range: TimeRange,
    max_pages_per_trace: Option<usize>,
) -> Vec<RawSpanEvent> {
    let mut all_spans = Vec::new();
    let mut seen_traces: HashSet<String> = HashSet::new();

    for event in initial {
        let trace_id = event.attr_str("trace_id").unwrap_or_default().to_string();
        if trace_id.is_empty() || !seen_traces.insert(trace_id.clone()) {
            all_spans.push(event.clone());
            continue;
        }

        expand_one_trace(
            source,
            event,
            &trace_id,
            time_range,
            max_pages_per_trace,
            &mut all_spans,
        )
        .await;
    }

    all_spans
}

async fn expand_one_trace<S: SpanSource>(
    source: &S,
    original: &RawSpanEvent,
    trace_id: &str,
    time_range: TimeRange,
    max_pages_per_trace: Option<usize>,
    out: &mut Vec<RawSpanEvent>,
) {
    let mut cursor: Option<String> = None;
    let mut page_num = 0usize;

    loop {
        page_num += 1;
        if let Some(cap) = max_pages_per_trace
            && page_num > cap
        {
            tracing::warn!(%trace_id, pages = cap, "stopping child-span expansion at page cap");
            // A cap of 0 halts before the first fetch; the fallback below
            // keeps the span from vanishing.
            if page_num == 1 {
                out.push(original.clone());
            }
            break;
        }

        let params = SpanSearchParams::for_trace(trace_id, time_range, cursor.take());
        match source.search_spans(&params).await {
            Ok(page) if !page.data.is_empty() => {
                tracing::debug!(
                    %trace_id,
                    page = page_num,
                    spans = page.data.len(),
                    "fetched child span page"
                );
                cursor = page.next_cursor().map(str::to_string);
                out.extend(page.data);
                if cursor.is_none() {
                    break;
                }
            }
            Ok(_) => {
                if page_num == 1 {
                    out.push(original.clone());
                }
                break;
            }
            Err(err) => {
                tracing::warn!(%trace_id, error = %err, "child-span expansion failed, keeping the original span");
                if page_num == 1 {
                    out.push(original.clone());
                }
                break;
            }
        }
    }
}
