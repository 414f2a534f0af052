//! Core functionality for the gateway.
//!
//! This module contains fundamental components used throughout the
//! application:
//! - Configuration management
//! - Error taxonomy
//! - Request fingerprinting and the response cache
//! - Metrics collection and HTTP middleware
//! - Rate limiting and host-resource probing

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod rate_limiter;
pub mod resources;

// Re-export commonly used types
pub use cache::ResponseCache;
pub use config::{AppConfig, CredentialConfig, EndpointConfig, ServerConfig, Tier};
pub use error::{GatewayError, Result};
pub use fingerprint::fingerprint;
pub use logging::{generate_request_id, get_request_id, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::MetricsMiddleware;
pub use rate_limiter::RateLimiter;
