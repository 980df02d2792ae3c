use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server failed")]
    Serve(#[source] std::io::Error),
    #[error("failed to build the layout service http client")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}
