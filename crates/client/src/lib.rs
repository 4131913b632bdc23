pub mod aggregate;
pub mod expand;
pub mod search;

use ddmcp_core::config::Config;
use ddmcp_core::error::{DdmcpError, Result};

pub use aggregate::{SpanAggregateParams, SpanAggregator};
pub use expand::expand_child_spans;
pub use search::{SpanSearchParams, SpanSource, build_search_query};

/// Handle to the Datadog API. Credentials and region are injected at
/// construction; the request timeout is baked into the underlying HTTP
/// client so every call shares one budget.
pub struct DatadogClient {
    http: reqwest::Client,
    config: Config,
}

impl DatadogClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DdmcpError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn max_pages_per_trace(&self) -> Option<usize> {
        self.config.max_pages_per_trace
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.site.api_url())
    }

    fn post_json(&self, path: &str, payload: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint(path))
            .header("DD-API-KEY", &self.config.api_key)
            .header("DD-APPLICATION-KEY", &self.config.app_key)
            .json(payload)
    }
}
