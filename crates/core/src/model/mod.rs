pub mod aggregate;
pub mod span;
