//! Layout client: named layout service handlers, option merging, and the
//! upstream call with its timeout and status mapping.

mod client;
mod error;
mod forwarded;
mod registry;
mod transport;

pub use client::{LayoutClient, METRIC_FETCH_ERROR, METRIC_FETCH_MS};
pub use error::LayoutError;
pub use forwarded::{ForwardedContext, X_FORWARDED_FOR, X_FORWARDED_HOST, X_FORWARDED_PROTO};
pub use registry::{
    HandlerRegistration, HandlerRegistry, HandlerRegistryBuilder, HandlerRegistryError,
};
pub use transport::{LayoutTransport, OutboundLayoutRequest, TransportError, TransportResponse};
