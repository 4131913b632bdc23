use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DdmcpError, Result};

/// Datadog region the client talks to. Resolved to an API base URL once at
/// startup; an unrecognized region is a fatal configuration error rather
/// than a per-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Site {
    #[default]
    Us1,
    Us3,
    Us5,
    Eu1,
    Ap1,
    Gov,
}

impl Site {
    pub fn api_url(self) -> &'static str {
        match self {
            Site::Us1 => "https://api.datadoghq.com",
            Site::Us3 => "https://api.us3.datadoghq.com",
            Site::Us5 => "https://api.us5.datadoghq.com",
            Site::Eu1 => "https://api.datadoghq.eu",
            Site::Ap1 => "https://api.ap1.datadoghq.com",
            Site::Gov => "https://api.ddog-gov.com",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Site::Us1 => "datadoghq.com",
            Site::Us3 => "us3.datadoghq.com",
            Site::Us5 => "us5.datadoghq.com",
            Site::Eu1 => "datadoghq.eu",
            Site::Ap1 => "ap1.datadoghq.com",
            Site::Gov => "ddog-gov.com",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = DdmcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "datadoghq.com" | "us1.datadoghq.com" => Ok(Site::Us1),
            "us3.datadoghq.com" => Ok(Site::Us3),
            "us5.datadoghq.com" => Ok(Site::Us5),
            "datadoghq.eu" | "eu1.datadoghq.com" => Ok(Site::Eu1),
            "ap1.datadoghq.com" => Ok(Site::Ap1),
            "ddog-gov.com" => Ok(Site::Gov),
            other => Err(DdmcpError::Config(format!(
                "unrecognized DD_SITE: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub site: Site,
    pub api_key: String,
    pub app_key: String,
    pub request_timeout: Duration,
    /// Safety cap for child-span expansion. `None` reproduces the upstream
    /// behavior of following cursors until the API stops returning them.
    pub max_pages_per_trace: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = required(&lookup, "DD_API_KEY")?;
        let app_key = required(&lookup, "DD_APP_KEY")?;

        let site = match lookup("DD_SITE") {
            Some(raw) => raw.parse()?,
            None => Site::default(),
        };

        let request_timeout = match lookup("DDMCP_REQUEST_TIMEOUT") {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| {
                DdmcpError::Config(format!("bad DDMCP_REQUEST_TIMEOUT: {e} (value={raw})"))
            })?,
            None => Duration::from_secs(30),
        };

        let max_pages_per_trace = match lookup("DDMCP_MAX_PAGES_PER_TRACE") {
            Some(raw) => Some(raw.parse::<usize>().map_err(|e| {
                DdmcpError::Config(format!("bad DDMCP_MAX_PAGES_PER_TRACE: {e} (value={raw})"))
            })?),
            None => None,
        };

        Ok(Self {
            site,
            api_key,
            app_key,
            request_timeout,
            max_pages_per_trace,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match lookup(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DdmcpError::Config(format!(
            "{key} environment variable must be set"
        ))),
    }
}
