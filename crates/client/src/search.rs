use std::collections::BTreeMap;

use ddmcp_core::error::{DdmcpError, Result};
use ddmcp_core::model::span::SpansPage;
use ddmcp_core::query::MAX_LIMIT;
use ddmcp_core::time::TimeRange;
use serde_json::json;

use crate::DatadogClient;

/// One paged request against the spans search endpoint.
#[derive(Debug, Clone)]
pub struct SpanSearchParams {
    pub time_range: TimeRange,
    pub filters: BTreeMap<String, String>,
    pub query: Option<String>,
    pub limit: usize,
    pub cursor: Option<String>,
}

impl SpanSearchParams {
    /// Follow-up fetch of every span belonging to one trace.
    pub fn for_trace(trace_id: &str, time_range: TimeRange, cursor: Option<String>) -> Self {
        Self {
            time_range,
            filters: BTreeMap::new(),
            query: Some(format!("trace_id:{trace_id}")),
            limit: MAX_LIMIT,
            cursor,
        }
    }
}

/// Seam between the expander/tool handlers and the upstream API, so tests
/// can script pages without a network.
pub trait SpanSource {
    fn search_spans(
        &self,
        params: &SpanSearchParams,
    ) -> impl Future<Output = Result<SpansPage>> + Send;
}

impl SpanSource for DatadogClient {
    async fn search_spans(&self, params: &SpanSearchParams) -> Result<SpansPage> {
        let query = build_search_query(&params.filters, params.query.as_deref());

        let mut page = json!({ "limit": params.limit.min(MAX_LIMIT) });
        if let Some(cursor) = &params.cursor {
            page["cursor"] = json!(cursor);
        }

        let payload = json!({
            "data": {
                "type": "search_request",
                "attributes": {
                    "filter": {
                        "from": params.time_range.from_expr(),
                        "to": "now",
                        "query": query,
                    },
                    "options": { "timezone": "GMT" },
                    "page": page,
                    "sort": "timestamp",
                },
            },
        });

        let response = self
            .post_json("/api/v2/spans/events/search", &payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%query, error = %e, "span search request failed");
                DdmcpError::Transport {
                    message: e.to_string(),
                    body: None,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%query, %status, "span search returned an error status");
            return Err(DdmcpError::Transport {
                message: format!("span search returned {status}"),
                body: Some(body),
            });
        }

        response
            .json::<SpansPage>()
            .await
            .map_err(|e| DdmcpError::Parse(format!("malformed span search response: {e}")))
    }
}

/// Combines structured filters and the free-text query into one upstream
/// query string. Values containing a space or `:` are quoted; an empty
/// combination matches everything.
pub fn build_search_query(filters: &BTreeMap<String, String>, query: Option<&str>) -> String {
    let mut parts: Vec<String> = filters
        .iter()
        .map(|(key, value)| {
            if value.contains(' ') || value.contains(':') {
                format!("{key}:\"{value}\"")
            } else {
                format!("{key}:{value}")
            }
        })
        .collect();

    if let Some(query) = query
        && !query.is_empty()
    {
        parts.push(query.to_string());
    }

    if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_input_matches_everything() {
        assert_eq!(build_search_query(&BTreeMap::new(), None), "*");
        assert_eq!(build_search_query(&BTreeMap::new(), Some("")), "*");
    }

    #[test]
    fn plain_filters_are_key_colon_value() {
        let q = build_search_query(&filters(&[("service", "web-api")]), None);
        assert_eq!(q, "service:web-api");
    }

    #[test]
    fn values_with_spaces_or_colons_are_quoted() {
        let q = build_search_query(&filters(&[("resource_name", "GET /api/users")]), None);
        assert_eq!(q, "resource_name:\"GET /api/users\"");

        let q = build_search_query(&filters(&[("peer", "redis:6379")]), None);
        assert_eq!(q, "peer:\"redis:6379\"");
    }

    #[test]
    fn filters_and_query_join_with_and() {
        let q = build_search_query(
            &filters(&[("env", "production"), ("service", "web-api")]),
            Some("status:error"),
        );
        assert_eq!(q, "env:production AND service:web-api AND status:error");
    }

    #[test]
    fn trace_params_query_by_trace_id() {
        let params = SpanSearchParams::for_trace("t1", TimeRange::OneHour, None);
        assert_eq!(params.query.as_deref(), Some("trace_id:t1"));
        assert_eq!(params.limit, MAX_LIMIT);
        assert_eq!(
            build_search_query(&params.filters, params.query.as_deref()),
            "trace_id:t1"
        );
    }
}
