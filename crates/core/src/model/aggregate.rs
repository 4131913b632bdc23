use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of the spans analytics aggregation endpoint: one bucket per
/// group-by combination, with computed values keyed `c0`, `c1`, ...
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregatePage {
    #[serde(default)]
    pub data: Vec<AggregateBucket>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateBucket {
    #[serde(default)]
    pub attributes: BucketAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketAttributes {
    #[serde(default)]
    pub by: Map<String, Value>,
    #[serde(default)]
    pub compute: Map<String, Value>,
}

impl AggregateBucket {
    /// First computed value (`c0`), the count for count aggregations.
    pub fn count(&self) -> u64 {
        self.attributes
            .compute
            .get("c0")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as u64
    }

    pub fn group_value(&self, facet: &str) -> String {
        match self.attributes.by.get(facet) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_count_and_group_values() {
        let page: AggregatePage = serde_json::from_str(
            r#"{"data": [{"attributes": {"by": {"env": "prod"}, "compute": {"c0": 1234}}}]}"#,
        )
        .unwrap();
        let bucket = &page.data[0];
        assert_eq!(bucket.count(), 1234);
        assert_eq!(bucket.group_value("env"), "prod");
        assert_eq!(bucket.group_value("service"), "");
    }

    #[test]
    fn missing_compute_counts_as_zero() {
        let page: AggregatePage =
            serde_json::from_str(r#"{"data": [{"attributes": {}}]}"#).unwrap();
        assert_eq!(page.data[0].count(), 0);
    }
}
