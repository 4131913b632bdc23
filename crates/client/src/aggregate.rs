use std::collections::BTreeMap;

use ddmcp_core::error::{DdmcpError, Result};
use ddmcp_core::model::aggregate::AggregatePage;
use ddmcp_core::time::TimeRange;
use serde_json::json;

use crate::DatadogClient;
use crate::search::build_search_query;

#[derive(Debug, Clone)]
pub struct SpanAggregateParams {
    pub time_range: TimeRange,
    pub filters: BTreeMap<String, String>,
    pub query: Option<String>,
    pub group_by: Vec<String>,
}

/// Seam for the aggregation endpoint, mirroring [`crate::SpanSource`].
pub trait SpanAggregator {
    fn aggregate_spans(
        &self,
        params: &SpanAggregateParams,
    ) -> impl Future<Output = Result<AggregatePage>> + Send;
}

impl SpanAggregator for DatadogClient {
    async fn aggregate_spans(&self, params: &SpanAggregateParams) -> Result<AggregatePage> {
        let query = build_search_query(&params.filters, params.query.as_deref());

        let mut attributes = json!({
            "compute": [{ "aggregation": "count", "type": "total" }],
            "filter": {
                "from": params.time_range.from_expr(),
                "to": "now",
                "query": query,
            },
        });
        if !params.group_by.is_empty() {
            attributes["group_by"] = params
                .group_by
                .iter()
                .map(|facet| json!({ "facet": facet, "limit": 1000 }))
                .collect();
        }

        let payload = json!({
            "data": {
                "type": "aggregate_request",
                "attributes": attributes,
            },
        });

        let response = self
            .post_json("/api/v2/spans/analytics/aggregate", &payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%query, error = %e, "span aggregation request failed");
                DdmcpError::Transport {
                    message: e.to_string(),
                    body: None,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%query, %status, "span aggregation returned an error status");
            return Err(DdmcpError::Transport {
                message: format!("span aggregation returned {status}"),
                body: Some(body),
            });
        }

        response
            .json::<AggregatePage>()
            .await
            .map_err(|e| DdmcpError::Parse(format!("malformed aggregation response: {e}")))
    }
}
