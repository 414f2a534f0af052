//! HTTP request handlers for the gateway API.
//!
//! This module contains the shared application state, the unary chat
//! completion handler, and the health and metrics endpoints.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::Value;

use crate::api::auth::{authorize, Identity};
use crate::api::models::{CompletionRequest, EndpointInfo, HealthResponse};
use crate::core::cache::ResponseCache;
use crate::core::config::{AppConfig, EndpointConfig};
use crate::core::error::{GatewayError, Result};
use crate::core::fingerprint::fingerprint;
use crate::core::logging::{generate_request_id, API_KEY_NAME, REQUEST_ID};
use crate::core::metrics::get_metrics;
use crate::core::rate_limiter::RateLimiter;
use crate::core::resources::tier_rate_limit;
use crate::services::failover::FailoverService;
use crate::services::sessions::SessionRegistry;
use crate::services::upstream::UpstreamClient;

/// Shared application state.
///
/// Constructed once at startup and passed by handle into every handler;
/// the cache and session registry are the only shared mutable structures.
pub struct AppState {
    pub config: AppConfig,
    /// Ordered endpoint list. Replaced atomically as a whole on reload,
    /// never mutated in place.
    pub endpoints: ArcSwap<Vec<EndpointConfig>>,
    pub cache: ResponseCache,
    pub sessions: SessionRegistry,
    pub rate_limiter: RateLimiter,
    pub failover: FailoverService,
}

impl AppState {
    /// Build the state from configuration, the shared HTTP client, and the
    /// advisor-computed cache capacity.
    pub fn new(config: AppConfig, http_client: reqwest::Client, cache_capacity: usize) -> Self {
        let client = UpstreamClient::new(
            http_client,
            Duration::from_secs(config.unary_timeout_secs),
            Duration::from_secs(config.stream_timeout_secs),
        );

        let rate_limiter = RateLimiter::new();
        for credential in &config.credentials {
            if !credential.enabled {
                continue;
            }
            let limit = credential
                .rate_limit
                .clone()
                .unwrap_or_else(|| tier_rate_limit(credential.tier));
            rate_limiter.register_key(&credential.key_hash, &limit);
            tracing::info!(
                credential = %credential.name,
                tier = %credential.tier,
                requests_per_second = limit.requests_per_second,
                "Registered rate limit for credential"
            );
        }

        let endpoints = ArcSwap::from_pointee(config.endpoints.clone());
        let cache = ResponseCache::new(
            cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        );

        Self {
            config,
            endpoints,
            cache,
            sessions: SessionRegistry::new(),
            rate_limiter,
            failover: FailoverService::new(client),
        }
    }

    /// Current endpoint list snapshot; iteration order is the configured order.
    pub fn endpoints_snapshot(&self) -> Arc<Vec<EndpointConfig>> {
        self.endpoints.load_full()
    }

    /// Atomically replace the whole endpoint sequence.
    pub fn replace_endpoints(&self, endpoints: Vec<EndpointConfig>) {
        self.endpoints.store(Arc::new(endpoints));
    }
}

/// Handle unary chat completion requests.
///
/// Flow: authorize → rate limit → validate → fingerprint → cache →
/// failover → cache store → verbatim body.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response> {
    let request_id = generate_request_id();

    REQUEST_ID
        .scope(request_id.clone(), async move {
            let identity = authorize(&headers, &state.config.credentials)?;
            let key_name = identity
                .name
                .clone()
                .unwrap_or_else(|| "anonymous".to_string());

            API_KEY_NAME
                .scope(key_name, handle_unary(state, identity, payload, request_id))
                .await
        })
        .await
}

async fn handle_unary(
    state: Arc<AppState>,
    identity: Identity,
    payload: Value,
    request_id: String,
) -> Result<Response> {
    state.rate_limiter.check_rate_limit(&identity.key_hash())?;

    let request = CompletionRequest::validate(&payload)?;
    if request.stream.unwrap_or(false) {
        return Err(GatewayError::BadRequest(
            "streaming requests use the websocket endpoint /ws/v1/chat/completions".to_string(),
        ));
    }

    // Fingerprint the raw body: absent fields stay absent, explicit nulls count
    let fp = fingerprint(&payload);

    if let Some(body) = state.cache.get(&fp) {
        get_metrics().cache_events.with_label_values(&["hit"]).inc();
        tracing::debug!(
            request_id = %request_id,
            model = %request.model,
            "Cache hit, bypassing upstream"
        );
        return Ok(Json(body).into_response());
    }
    get_metrics().cache_events.with_label_values(&["miss"]).inc();

    tracing::debug!(
        request_id = %request_id,
        model = %request.model,
        "Forwarding chat completion request"
    );

    let endpoints = state.endpoints_snapshot();
    let body = state
        .failover
        .run_unary(&endpoints, &identity.key, &payload, &state.cache, &fp)
        .await?;

    Ok(Json(body).into_response())
}

/// Basic health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let endpoints = state.endpoints_snapshot();
    let endpoint_info = endpoints
        .iter()
        .map(|endpoint| EndpointInfo {
            name: endpoint.name.clone(),
            base_url: endpoint.base_url.clone(),
        })
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        endpoints: endpoints.len(),
        endpoint_info,
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|error| GatewayError::Internal(error.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(buffer.into())
        .map_err(|error| GatewayError::Internal(error.to_string()))
}
