//! `reqwest` transport for the layout service.

use async_trait::async_trait;
use axum::http::header::ACCEPT;
use bytes::BytesMut;
use reqwest::Client;

use crate::application::layout::{
    LayoutTransport, OutboundLayoutRequest, TransportError, TransportResponse,
};

use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct ReqwestLayoutTransport {
    client: Client,
    max_body_bytes: usize,
}

impl ReqwestLayoutTransport {
    /// Bodies larger than `max_body_bytes` are abandoned mid-read.
    pub fn new(max_body_bytes: usize) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(InfraError::HttpClient)?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("pumpkin/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl LayoutTransport for ReqwestLayoutTransport {
    async fn send(
        &self,
        request: OutboundLayoutRequest,
    ) -> Result<TransportResponse, TransportError> {
        let OutboundLayoutRequest { url, headers, .. } = request;

        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .headers(headers)
            .send()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let status = response.status();
        let limit = self.max_body_bytes;
        if response
            .content_length()
            .is_some_and(|length| length > limit as u64)
        {
            return Err(TransportError::TooLarge { limit });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| TransportError::Body(err.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        Ok(TransportResponse { status, body })
    }
}
