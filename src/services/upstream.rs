//! Upstream client: one attempt against one endpoint.
//!
//! Issues a single unary or streaming call and classifies the result into
//! an explicit [`AttemptOutcome`]. Retry policy lives in the failover
//! orchestrator — this client never retries, and never touches the cache
//! or session state.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::core::config::EndpointConfig;
use crate::core::error::GatewayError;

/// Outcome of one attempt against one endpoint. Exactly one tag per attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// HTTP 200 with a usable payload
    Success(T),
    /// Upstream answered with a non-200 status; body drained as text
    UpstreamError { status: u16, body: String },
    /// Deadline exceeded with no response
    Timeout,
    /// Could not establish a connection
    ConnectFailure,
    /// Any other transport-level failure
    Other(String),
}

impl<T> AttemptOutcome<T> {
    /// Label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::UpstreamError { .. } => "upstream_error",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::ConnectFailure => "connect_failure",
            AttemptOutcome::Other(_) => "other",
        }
    }
}

/// Classify a reqwest transport error into an attempt outcome.
///
/// The timeout/connect distinction is load-bearing: it drives the error
/// taxonomy the caller eventually sees.
fn classify_transport_error<T>(error: &reqwest::Error) -> AttemptOutcome<T> {
    if error.is_timeout() {
        AttemptOutcome::Timeout
    } else if error.is_connect() {
        AttemptOutcome::ConnectFailure
    } else {
        AttemptOutcome::Other(error.to_string())
    }
}

/// Classify a transport error that broke a stream after the initial 200.
///
/// Mid-relay breaks never fail over; they only shape the single error
/// notification the session sends. Raw error text stays in the logs.
pub fn classify_stream_break(error: &reqwest::Error, endpoint: &EndpointConfig) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Internal(format!(
            "stream from endpoint '{}' broke mid-relay: {}",
            endpoint.name, error
        ))
    }
}

/// Client for single attempts against upstream endpoints.
///
/// Wraps the process-wide pooled HTTP client plus the two attempt-scoped
/// deadlines. The streaming deadline bounds the entire attempt, connection
/// through last byte — total wall time per request is therefore capped at
/// endpoint count × per-attempt timeout.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    unary_timeout: Duration,
    stream_timeout: Duration,
}

impl UpstreamClient {
    /// Create a client from the shared HTTP client and configured deadlines.
    pub fn new(client: reqwest::Client, unary_timeout: Duration, stream_timeout: Duration) -> Self {
        Self {
            client,
            unary_timeout,
            stream_timeout,
        }
    }

    /// One unary attempt: send the payload, read the full response.
    ///
    /// `Success` iff the status is exactly 200 and the body decodes as JSON.
    /// Any other status becomes `UpstreamError` carrying the raw body text.
    pub async fn unary(
        &self,
        endpoint: &EndpointConfig,
        api_key: &str,
        payload: &Value,
    ) -> AttemptOutcome<Value> {
        let url = endpoint.completions_url();

        let result = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(self.unary_timeout)
            .json(payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    url = %url,
                    error = %error,
                    is_timeout = error.is_timeout(),
                    is_connect = error.is_connect(),
                    "Unary attempt failed before a response"
                );
                return classify_transport_error(&error);
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            match response.json::<Value>().await {
                Ok(body) => AttemptOutcome::Success(body),
                Err(error) => {
                    tracing::error!(
                        endpoint = %endpoint.name,
                        error = %error,
                        "Upstream returned 200 with an undecodable body"
                    );
                    if error.is_timeout() {
                        AttemptOutcome::Timeout
                    } else {
                        AttemptOutcome::Other(format!("invalid JSON from upstream: {}", error))
                    }
                }
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint = %endpoint.name,
                status = status.as_u16(),
                body = %body,
                "Upstream returned an error status"
            );
            AttemptOutcome::UpstreamError {
                status: status.as_u16(),
                body,
            }
        }
    }

    /// One streaming attempt: open the connection and return the live
    /// response on an initial 200, for the caller to consume exactly once.
    ///
    /// A non-200 initial status drains the body into `UpstreamError`.
    pub async fn stream(
        &self,
        endpoint: &EndpointConfig,
        api_key: &str,
        payload: &Value,
    ) -> AttemptOutcome<reqwest::Response> {
        let url = endpoint.completions_url();

        let result = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(self.stream_timeout)
            .json(payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    url = %url,
                    error = %error,
                    is_timeout = error.is_timeout(),
                    is_connect = error.is_connect(),
                    "Streaming attempt failed before a response"
                );
                return classify_transport_error(&error);
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            AttemptOutcome::Success(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint = %endpoint.name,
                status = status.as_u16(),
                body = %body,
                "Upstream rejected the streaming attempt"
            );
            AttemptOutcome::UpstreamError {
                status: status.as_u16(),
                body,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint_for(uri: &str) -> EndpointConfig {
        EndpointConfig {
            name: "mock".to_string(),
            base_url: uri.to_string(),
        }
    }

    fn test_client() -> UpstreamClient {
        UpstreamClient::new(
            reqwest::Client::new(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_unary_success_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer caller-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "resp-1"})))
            .mount(&server)
            .await;

        let outcome = test_client()
            .unary(&endpoint_for(&server.uri()), "caller-key", &json!({"model": "m"}))
            .await;

        match outcome {
            AttemptOutcome::Success(body) => assert_eq!(body["id"], "resp-1"),
            other => panic!("expected success, got {:?}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_unary_non_200_is_upstream_error_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let outcome = test_client()
            .unary(&endpoint_for(&server.uri()), "k", &json!({}))
            .await;

        match outcome {
            AttemptOutcome::UpstreamError { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("expected upstream error, got {:?}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_unary_201_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "x"})))
            .mount(&server)
            .await;

        let outcome = test_client()
            .unary(&endpoint_for(&server.uri()), "k", &json!({}))
            .await;

        assert!(matches!(
            outcome,
            AttemptOutcome::UpstreamError { status: 201, .. }
        ));
    }

    #[tokio::test]
    async fn test_unary_connect_failure() {
        // Nothing listens on this port
        let endpoint = endpoint_for("http://127.0.0.1:9");

        let outcome = test_client().unary(&endpoint, "k", &json!({})).await;
        assert!(matches!(outcome, AttemptOutcome::ConnectFailure));
    }

    #[tokio::test]
    async fn test_unary_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(
            reqwest::Client::new(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );

        let outcome = client
            .unary(&endpoint_for(&server.uri()), "k", &json!({}))
            .await;
        assert!(matches!(outcome, AttemptOutcome::Timeout));
    }

    #[tokio::test]
    async fn test_unary_undecodable_200_body_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let outcome = test_client()
            .unary(&endpoint_for(&server.uri()), "k", &json!({}))
            .await;
        assert!(matches!(outcome, AttemptOutcome::Other(_)));
    }

    #[tokio::test]
    async fn test_stream_success_hands_back_live_response() {
        use futures::StreamExt;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: hello\n\n"))
            .mount(&server)
            .await;

        let outcome = test_client()
            .stream(&endpoint_for(&server.uri()), "k", &json!({"stream": true}))
            .await;

        match outcome {
            AttemptOutcome::Success(response) => {
                let mut stream = response.bytes_stream();
                let mut collected = Vec::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk.unwrap());
                }
                assert_eq!(collected, b"data: hello\n\n");
            }
            other => panic!("expected success, got {:?}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_stream_non_200_drains_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Upstream server error"))
            .mount(&server)
            .await;

        let outcome = test_client()
            .stream(&endpoint_for(&server.uri()), "k", &json!({}))
            .await;

        match outcome {
            AttemptOutcome::UpstreamError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "Upstream server error");
            }
            other => panic!("expected upstream error, got {:?}", other.label()),
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::<()>::Timeout.label(), "timeout");
        assert_eq!(AttemptOutcome::<()>::ConnectFailure.label(), "connect_failure");
        assert_eq!(
            AttemptOutcome::<()>::UpstreamError {
                status: 500,
                body: String::new()
            }
            .label(),
            "upstream_error"
        );
    }
}
