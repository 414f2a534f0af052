//! LLM Gateway - A failover-aware reverse proxy for chat-completion APIs
//!
//! This library provides a gateway that forwards chat-completion requests
//! (unary and streaming) to an ordered list of interchangeable upstream
//! endpoints, with:
//!
//! - **Ordered Failover**: endpoints are tried strictly in configured
//!   order, once each; the last observed failure is what callers see
//! - **Response Cache**: identical requests short-circuit to a bounded,
//!   time-expiring cache keyed by a canonical request fingerprint
//! - **Streaming Sessions**: WebSocket relays of raw upstream chunks with
//!   guaranteed session teardown
//! - **Stable Error Taxonomy**: heterogeneous upstream failures normalize
//!   to four kinds (service_down 503, timeout 504, upstream_rejected 502,
//!   proxy_internal 500)
//! - **Metrics & Monitoring**: Prometheus metrics for observability
//!
//! # Architecture
//!
//! The codebase is organized into three main layers:
//!
//! - [`core`]: fundamentals (config, errors, fingerprint, cache, metrics,
//!   rate limiting, resource probing)
//! - [`services`]: business logic (upstream attempts, failover, sessions)
//! - [`api`]: HTTP handlers, the WebSocket endpoint, and request models
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file (`CONFIG_PATH`, default
//! `config.yaml`) with environment variable expansion. Optional
//! environment overrides: `HOST`, `PORT`, `VERIFY_SSL`,
//! `UNARY_TIMEOUT_SECS`, `STREAM_TIMEOUT_SECS`, `TOKIO_WORKER_THREADS`.

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{app_router, AppState, CompletionRequest};
pub use core::{
    fingerprint, AppConfig, EndpointConfig, GatewayError, RateLimiter, ResponseCache, Result,
};
pub use services::{FailoverService, SessionRegistry, UpstreamClient};
