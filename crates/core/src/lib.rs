pub mod config;
pub mod error;
pub mod extract;
pub mod hierarchy;
pub mod model;
pub mod query;
pub mod time;

pub use error::{DdmcpError, Result};
