//! Failover orchestration across the ordered endpoint list.
//!
//! Endpoints are tried strictly in configured order, once each — no
//! randomization, no retry of an already-failed endpoint within the same
//! request. Every failed attempt is recorded as the last observed failure;
//! exhaustion surfaces that failure through the error taxonomy rather than
//! a generic aggregate, so the caller sees the most recent concrete cause.

use serde_json::Value;

use crate::core::cache::ResponseCache;
use crate::core::config::EndpointConfig;
use crate::core::error::GatewayError;
use crate::core::logging::ENDPOINT_CONTEXT;
use crate::core::metrics::get_metrics;
use crate::services::upstream::{AttemptOutcome, UpstreamClient};

/// Orchestrates attempts across the endpoint list.
#[derive(Clone)]
pub struct FailoverService {
    client: UpstreamClient,
}

/// Map a failed attempt to its taxonomy error, keeping the endpoint that
/// produced it where the kind calls for one.
fn failure_to_error<T>(endpoint: &EndpointConfig, outcome: &AttemptOutcome<T>) -> GatewayError {
    match outcome {
        AttemptOutcome::ConnectFailure => GatewayError::ServiceDown {
            endpoint: endpoint.base_url.clone(),
        },
        AttemptOutcome::Timeout => GatewayError::Timeout,
        AttemptOutcome::UpstreamError { status, body } => {
            GatewayError::upstream_rejected(*status, body)
        }
        AttemptOutcome::Other(description) => GatewayError::Internal(format!(
            "endpoint '{}' failed: {}",
            endpoint.name, description
        )),
        AttemptOutcome::Success(_) => unreachable!("success is not a failure"),
    }
}

impl FailoverService {
    /// Create a failover service over the given upstream client.
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Run the unary path: try each endpoint in order until one returns 200,
    /// caching the body under `fp` before handing it back.
    ///
    /// A cache hit bypasses this entirely — callers check the cache first.
    pub async fn run_unary(
        &self,
        endpoints: &[EndpointConfig],
        api_key: &str,
        payload: &Value,
        cache: &ResponseCache,
        fp: &str,
    ) -> Result<Value, GatewayError> {
        if endpoints.is_empty() {
            tracing::warn!("No upstream endpoints configured");
            return Err(GatewayError::AllEndpointsDown);
        }

        let mut last_failure: Option<GatewayError> = None;

        for endpoint in endpoints {
            let outcome = ENDPOINT_CONTEXT
                .scope(
                    endpoint.name.clone(),
                    self.client.unary(endpoint, api_key, payload),
                )
                .await;
            get_metrics()
                .upstream_attempts
                .with_label_values(&[&endpoint.name, "unary", outcome.label()])
                .inc();

            match outcome {
                AttemptOutcome::Success(body) => {
                    cache.put(fp, body.clone());
                    get_metrics().cache_events.with_label_values(&["store"]).inc();
                    tracing::info!(
                        endpoint = %endpoint.name,
                        "Unary request served by endpoint"
                    );
                    return Ok(body);
                }
                failure => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        outcome = failure.label(),
                        "Unary attempt failed, trying next endpoint"
                    );
                    last_failure = Some(failure_to_error(endpoint, &failure));
                }
            }
        }

        Err(last_failure.unwrap_or(GatewayError::AllEndpointsDown))
    }

    /// Run the streaming establishment path: try each endpoint in order until
    /// one accepts with an initial 200, handing back the live response and
    /// the endpoint that accepted it.
    ///
    /// Failures here are establishment failures only; once a stream is
    /// flowing, breaks are the session manager's problem and never fail over.
    pub async fn run_stream(
        &self,
        endpoints: &[EndpointConfig],
        api_key: &str,
        payload: &Value,
    ) -> Result<(EndpointConfig, reqwest::Response), GatewayError> {
        if endpoints.is_empty() {
            tracing::warn!("No upstream endpoints configured");
            return Err(GatewayError::AllEndpointsDown);
        }

        let mut last_failure: Option<GatewayError> = None;

        for endpoint in endpoints {
            let outcome = ENDPOINT_CONTEXT
                .scope(
                    endpoint.name.clone(),
                    self.client.stream(endpoint, api_key, payload),
                )
                .await;
            get_metrics()
                .upstream_attempts
                .with_label_values(&[&endpoint.name, "stream", outcome.label()])
                .inc();

            match outcome {
                AttemptOutcome::Success(response) => {
                    tracing::info!(
                        endpoint = %endpoint.name,
                        "Streaming session accepted by endpoint"
                    );
                    return Ok((endpoint.clone(), response));
                }
                failure => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        outcome = failure.label(),
                        "Streaming attempt failed to establish, trying next endpoint"
                    );
                    last_failure = Some(failure_to_error(endpoint, &failure));
                }
            }
        }

        Err(last_failure.unwrap_or(GatewayError::AllEndpointsDown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service() -> FailoverService {
        crate::core::metrics::init_metrics();
        FailoverService::new(UpstreamClient::new(
            reqwest::Client::new(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        ))
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(16, Duration::from_secs(300))
    }

    fn dead_endpoint(name: &str) -> EndpointConfig {
        // Nothing listens on port 9 (discard); connecting fails fast.
        EndpointConfig {
            name: name.to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        }
    }

    fn endpoint_for(name: &str, uri: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            base_url: uri.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_endpoint_list_short_circuits() {
        let cache = cache();
        let result = service()
            .run_unary(&[], "k", &json!({}), &cache, "fp")
            .await;

        match result {
            Err(GatewayError::AllEndpointsDown) => {}
            other => panic!("expected AllEndpointsDown, got {:?}", other),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_first_endpoint_success_stops_iteration() {
        let server_a = MockServer::start().await;
        let server_b = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "from-a"})))
            .expect(1)
            .mount(&server_a)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "from-b"})))
            .expect(0)
            .mount(&server_b)
            .await;

        let endpoints = vec![
            endpoint_for("a", &server_a.uri()),
            endpoint_for("b", &server_b.uri()),
        ];

        let cache = cache();
        let body = service()
            .run_unary(&endpoints, "k", &json!({"q": 1}), &cache, "fp-1")
            .await
            .unwrap();
        assert_eq!(body["id"], "from-a");
    }

    #[tokio::test]
    async fn test_failover_reaches_the_first_healthy_endpoint() {
        let live = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "from-c"})))
            .expect(1)
            .mount(&live)
            .await;

        let endpoints = vec![
            dead_endpoint("a"),
            dead_endpoint("b"),
            endpoint_for("c", &live.uri()),
        ];

        let cache = cache();
        let payload = json!({"model": "m", "messages": []});
        let fp = fingerprint(&payload);

        let body = service()
            .run_unary(&endpoints, "k", &payload, &cache, &fp)
            .await
            .unwrap();
        assert_eq!(body["id"], "from-c");

        // Successful fallback responses are cached like any other
        assert_eq!(cache.get(&fp), Some(json!({"id": "from-c"})));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_upstream_rejection() {
        let server_a = MockServer::start().await;
        let server_b = MockServer::start().await;
        for server in [&server_a, &server_b] {
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(500).set_body_string("internal exploded"))
                .expect(1)
                .mount(server)
                .await;
        }

        let endpoints = vec![
            endpoint_for("a", &server_a.uri()),
            endpoint_for("b", &server_b.uri()),
        ];

        let cache = cache();
        let err = service()
            .run_unary(&endpoints, "k", &json!({}), &cache, "fp")
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("500"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_by_connect_failure_names_last_endpoint() {
        let endpoints = vec![dead_endpoint("a"), dead_endpoint("b")];

        let cache = cache();
        let err = service()
            .run_unary(&endpoints, "k", &json!({}), &cache, "fp")
            .await
            .unwrap_err();

        match err {
            GatewayError::ServiceDown { ref endpoint } => {
                assert_eq!(endpoint, "http://127.0.0.1:9");
            }
            other => panic!("expected ServiceDown, got {:?}", other),
        }
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_stream_establishment_fails_over_then_returns_live_response() {
        let live = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
            .mount(&live)
            .await;

        let endpoints = vec![dead_endpoint("a"), endpoint_for("b", &live.uri())];

        let (endpoint, response) = service()
            .run_stream(&endpoints, "k", &json!({"stream": true}))
            .await
            .unwrap();

        assert_eq!(endpoint.name, "b");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stream_exhaustion_surfaces_last_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let endpoints = vec![dead_endpoint("a"), endpoint_for("b", &server.uri())];

        let err = service()
            .run_stream(&endpoints, "k", &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UpstreamRejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_stream_empty_endpoint_list() {
        let err = service().run_stream(&[], "k", &json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::AllEndpointsDown));
    }
}
