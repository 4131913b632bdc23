use thiserror::Error;

#[derive(Debug, Error)]
pub enum DdmcpError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("transport error: {message}{}", body_suffix(body))]
    Transport {
        message: String,
        body: Option<String>,
    },
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(body) if !body.is_empty() => format!(" (response body: {body})"),
        _ => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, DdmcpError>;
