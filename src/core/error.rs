//! Error types and handling for the gateway.
//!
//! This module provides a unified error type [`GatewayError`] covering the
//! stable upstream-failure taxonomy plus the plumbing failures handlers
//! produce, and implements proper HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Maximum number of characters of an upstream error body echoed to callers.
///
/// The full body is always logged; only this prefix reaches the client.
pub const UPSTREAM_BODY_PREVIEW_LIMIT: usize = 500;

/// Main error type for the gateway.
///
/// The first four variants form the stable external taxonomy; the rest are
/// plumbing failures raised before a request ever reaches the failover loop.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Could not establish a connection to an upstream endpoint
    #[error("Could not connect to AI service endpoint: {endpoint}. It may be temporarily down.")]
    ServiceDown { endpoint: String },

    /// The endpoint list was empty, or nothing more specific is known
    #[error("All AI service endpoints are currently unavailable or failed.")]
    AllEndpointsDown,

    /// Deadline exceeded with no response from upstream
    #[error("The AI service took too long to respond, possibly due to a network problem. Please try again.")]
    Timeout,

    /// Upstream answered with a non-200 status
    #[error("The AI service returned an unexpected error (status: {status}). Details: {body}")]
    UpstreamRejected { status: u16, body: String },

    /// Anything else unexpected. The payload is logged, never shown to callers.
    #[error("An unexpected problem occurred with the AI proxy service. Please try again later.")]
    Internal(String),

    /// Missing or malformed credential
    #[error("API Key is required in Authorization header.")]
    Unauthorized,

    /// Per-credential rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Client provided invalid data
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    /// Build an [`UpstreamRejected`](GatewayError::UpstreamRejected) with the
    /// raw body truncated to a safe preview length.
    pub fn upstream_rejected(status: u16, raw_body: &str) -> Self {
        let body = if raw_body.chars().count() > UPSTREAM_BODY_PREVIEW_LIMIT {
            let truncated: String = raw_body.chars().take(UPSTREAM_BODY_PREVIEW_LIMIT).collect();
            format!("{}…", truncated)
        } else {
            raw_body.to_string()
        };
        GatewayError::UpstreamRejected { status, body }
    }

    /// Stable machine-readable kind string, used as `type` in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ServiceDown { .. } | GatewayError::AllEndpointsDown => "service_down",
            GatewayError::Timeout => "timeout",
            GatewayError::UpstreamRejected { .. } => "upstream_rejected",
            GatewayError::Internal(_) => "proxy_internal",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::RateLimited(_) => "rate_limited",
            GatewayError::BadRequest(_) => "bad_request",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ServiceDown { .. } | GatewayError::AllEndpointsDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Internal(ref detail) = self {
            // Internal detail stays in the logs; callers get the generic message.
            tracing::error!(detail = %detail, "Proxy internal error");
        }

        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`GatewayError`].
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::Unauthorized;
        assert_eq!(err.to_string(), "API Key is required in Authorization header.");

        let err = GatewayError::Timeout;
        assert!(err.to_string().contains("took too long"));

        let err = GatewayError::ServiceDown {
            endpoint: "http://upstream-a".to_string(),
        };
        assert!(err.to_string().contains("http://upstream-a"));
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = GatewayError::Internal("stack trace with secrets".to_string());
        assert!(!err.to_string().contains("secrets"));
        assert!(err.to_string().contains("unexpected problem"));
    }

    #[test]
    fn test_upstream_rejected_message_carries_status_and_body() {
        let err = GatewayError::upstream_rejected(500, "boom");
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_upstream_rejected_truncates_long_bodies() {
        let long_body = "x".repeat(UPSTREAM_BODY_PREVIEW_LIMIT * 2);
        let err = GatewayError::upstream_rejected(502, &long_body);
        match err {
            GatewayError::UpstreamRejected { body, .. } => {
                assert!(body.chars().count() <= UPSTREAM_BODY_PREVIEW_LIMIT + 1);
                assert!(body.ends_with('…'));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_taxonomy_status_mapping() {
        let service_down = GatewayError::ServiceDown {
            endpoint: "http://a".to_string(),
        };
        assert_eq!(service_down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            GatewayError::AllEndpointsDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GatewayError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            GatewayError::upstream_rejected(429, "slow down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(GatewayError::AllEndpointsDown.kind(), "service_down");
        assert_eq!(GatewayError::Timeout.kind(), "timeout");
        assert_eq!(GatewayError::upstream_rejected(500, "").kind(), "upstream_rejected");
        assert_eq!(GatewayError::Internal(String::new()).kind(), "proxy_internal");
    }

    #[test]
    fn test_error_into_response() {
        let err = GatewayError::Unauthorized;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_timeout_response() {
        let err = GatewayError::Timeout;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_rate_limited_response() {
        let err = GatewayError::RateLimited("key over quota".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_result_type_alias() {
        fn returns_result() -> Result<String> {
            Ok("success".to_string())
        }

        let result = returns_result();
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "success");
    }
}
