use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::layout::{HandlerRegistryError, LayoutError},
    config::LoadError,
    infra::error::InfraError,
};

/// Why a response failed, carried in response extensions until the response
/// logger picks it up. Never rendered in production.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    /// Capture `error` and every `source()` below it, outermost first.
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    /// Outermost message, the one the response logger leads with.
    pub fn headline(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failure reported by `main` before exiting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Registry(#[from] HandlerRegistryError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to encode layout document: {0}")]
    Encode(#[from] serde_json::Error),
}
