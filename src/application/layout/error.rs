use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout handler `{0}` is not registered")]
    UnknownHandler(String),
    #[error("layout handler `{handler}` did not answer within {timeout:?}")]
    Timeout { handler: String, timeout: Duration },
    #[error("layout service rejected the request with {status}: {detail}")]
    Upstream4xx { status: StatusCode, detail: String },
    #[error("layout service failed with {status}: {detail}")]
    Upstream5xx { status: StatusCode, detail: String },
    #[error("layout service returned a malformed document: {0}")]
    Malformed(String),
}

impl LayoutError {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            LayoutError::UnknownHandler(_) => "unknown_handler",
            LayoutError::Timeout { .. } => "timeout",
            LayoutError::Upstream4xx { .. } => "upstream_4xx",
            LayoutError::Upstream5xx { .. } => "upstream_5xx",
            LayoutError::Malformed(_) => "malformed",
        }
    }

    /// The layout service has no item at the requested path.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LayoutError::Upstream4xx { status, .. } if *status == StatusCode::NOT_FOUND
        )
    }

    /// Status of the error page rendered for this failure.
    pub fn response_status(&self) -> StatusCode {
        match self {
            LayoutError::UnknownHandler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LayoutError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            error if error.is_not_found() => StatusCode::NOT_FOUND,
            LayoutError::Upstream4xx { .. }
            | LayoutError::Upstream5xx { .. }
            | LayoutError::Malformed(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_failure_kind() {
        let not_found = LayoutError::Upstream4xx {
            status: StatusCode::NOT_FOUND,
            detail: String::new(),
        };
        let forbidden = LayoutError::Upstream4xx {
            status: StatusCode::FORBIDDEN,
            detail: String::new(),
        };
        let timeout = LayoutError::Timeout {
            handler: "default".to_string(),
            timeout: Duration::from_millis(50),
        };

        assert!(not_found.is_not_found());
        assert_eq!(not_found.response_status(), StatusCode::NOT_FOUND);
        assert_eq!(forbidden.response_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(timeout.response_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            LayoutError::UnknownHandler("x".to_string()).response_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            LayoutError::Malformed("eof".to_string()).response_status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
