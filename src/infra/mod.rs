//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod layout_http;
pub mod telemetry;
