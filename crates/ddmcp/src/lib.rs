pub mod render;
pub mod server;
pub mod telemetry;
pub mod tools;
