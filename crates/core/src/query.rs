use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::time::TimeRange;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

/// Arguments of the `get_traces` tool. Field defaults mirror the tool's
/// advertised JSON schema so partially-specified MCP calls deserialize
/// without ceremony.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracesParams {
    pub time_range: TimeRange,
    pub filters: BTreeMap<String, String>,
    pub query: Option<String>,
    pub limit: usize,
    pub cursor: Option<String>,
    pub format: TraceFormat,
    pub include_children: bool,
}

impl Default for TracesParams {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            filters: BTreeMap::new(),
            query: None,
            limit: DEFAULT_LIMIT,
            cursor: None,
            format: TraceFormat::default(),
            include_children: false,
        }
    }
}

impl TracesParams {
    /// The schema defaults `cursor` to `""`; treat that the same as absent.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }

    pub fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    #[default]
    Table,
    Text,
    Json,
    Debug,
    Summary,
}

impl std::str::FromStr for TraceFormat {
    type Err = crate::error::DdmcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "debug" => Ok(Self::Debug),
            "summary" => Ok(Self::Summary),
            other => Err(crate::error::DdmcpError::InvalidArgument(format!(
                "unknown trace format '{other}' (expected table, text, json, debug or summary)"
            ))),
        }
    }
}

/// Arguments of the `aggregate_traces` tool.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AggregateParams {
    pub time_range: TimeRange,
    pub filters: BTreeMap<String, String>,
    pub query: Option<String>,
    pub group_by: Vec<String>,
    pub format: AggregateFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFormat {
    #[default]
    Table,
    Json,
    Summary,
}

impl std::str::FromStr for AggregateFormat {
    type Err = crate::error::DdmcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "summary" => Ok(Self::Summary),
            other => Err(crate::error::DdmcpError::InvalidArgument(format!(
                "unknown aggregate format '{other}' (expected table, json or summary)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traces_params_deserialize_with_defaults() {
        let params: TracesParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 50);
        assert_eq!(params.format, TraceFormat::Table);
        assert!(!params.include_children);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn empty_cursor_reads_as_absent() {
        let params: TracesParams = serde_json::from_str(r#"{"cursor": ""}"#).unwrap();
        assert_eq!(params.cursor(), None);
        let params: TracesParams = serde_json::from_str(r#"{"cursor": "abc"}"#).unwrap();
        assert_eq!(params.cursor(), Some("abc"));
    }

    #[test]
    fn limit_clamps_into_api_bounds() {
        let params = TracesParams {
            limit: 5000,
            ..TracesParams::default()
        };
        assert_eq!(params.clamped_limit(), 1000);
        let params = TracesParams {
            limit: 0,
            ..TracesParams::default()
        };
        assert_eq!(params.clamped_limit(), 1);
    }

    #[test]
    fn formats_parse_from_lowercase_names() {
        let params: TracesParams =
            serde_json::from_str(r#"{"format": "summary", "time_range": "4h"}"#).unwrap();
        assert_eq!(params.format, TraceFormat::Summary);
        assert_eq!(params.time_range, TimeRange::FourHours);
        assert!(serde_json::from_str::<TracesParams>(r#"{"format": "xml"}"#).is_err());
    }
}
