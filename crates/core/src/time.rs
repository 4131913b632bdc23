use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DdmcpError;

/// Relative lookback window accepted by the trace and aggregation tools.
///
/// The upstream search API takes these verbatim as `now-<range>`, so the
/// variants mirror the windows Datadog accepts rather than free-form
/// durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    OneHour,
    FourHours,
    EightHours,
    OneDay,
    SevenDays,
    FourteenDays,
    ThirtyDays,
    SixtyDays,
    NinetyDays,
    HundredEightyDays,
    Year,
}

impl TimeRange {
    pub const ALL: [TimeRange; 11] = [
        TimeRange::OneHour,
        TimeRange::FourHours,
        TimeRange::EightHours,
        TimeRange::OneDay,
        TimeRange::SevenDays,
        TimeRange::FourteenDays,
        TimeRange::ThirtyDays,
        TimeRange::SixtyDays,
        TimeRange::NinetyDays,
        TimeRange::HundredEightyDays,
        TimeRange::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::FourHours => "4h",
            TimeRange::EightHours => "8h",
            TimeRange::OneDay => "1d",
            TimeRange::SevenDays => "7d",
            TimeRange::FourteenDays => "14d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::SixtyDays => "60d",
            TimeRange::NinetyDays => "90d",
            TimeRange::HundredEightyDays => "180d",
            TimeRange::Year => "365d",
        }
    }

    /// The `from` expression for the upstream filter, e.g. `now-1h`.
    pub fn from_expr(self) -> String {
        format!("now-{}", self.as_str())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = DdmcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DdmcpError::Parse(format!("unknown time range: {s}")))
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
