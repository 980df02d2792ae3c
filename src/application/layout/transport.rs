use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

/// Fully built layout service call: URL with query, plus forwarded headers.
#[derive(Debug, Clone)]
pub struct OutboundLayoutRequest {
    pub handler: String,
    pub url: Url,
    pub headers: HeaderMap,
}

impl OutboundLayoutRequest {
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to reach layout service: {0}")]
    Connect(String),
    #[error("failed to read layout service response: {0}")]
    Body(String),
    #[error("layout service response exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Sends a layout request over the wire. Implementations must not retry.
#[async_trait]
pub trait LayoutTransport: Send + Sync {
    async fn send(
        &self,
        request: OutboundLayoutRequest,
    ) -> Result<TransportResponse, TransportError>;
}
