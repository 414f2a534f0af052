//! Configuration management for the gateway.
//!
//! This module handles loading and parsing configuration from YAML files,
//! with support for environment variable expansion. The upstream endpoint
//! list is ordered: the first entry is always tried first.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ordered list of interchangeable upstream endpoints
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Per-attempt deadline for unary requests, in seconds
    #[serde(default = "default_unary_timeout")]
    pub unary_timeout_secs: u64,

    /// Per-attempt deadline for streaming requests, in seconds.
    /// Longer than the unary bound to tolerate slow first tokens.
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,

    /// Response cache time-to-live, in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Known caller credentials with tier labels
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

/// One upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint name (for logging and metrics)
    pub name: String,

    /// Base URL, e.g. `https://ai.example.com/api/v1`
    pub base_url: String,
}

impl EndpointConfig {
    /// Full chat-completions URL for this endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Caller tier, used for rate-limit magnitude only — never for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Customer,
    Business,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Customer => write!(f, "customer"),
            Tier::Business => write!(f, "business"),
        }
    }
}

/// Configuration for a known caller credential.
///
/// The gateway forwards the caller's own key upstream; credentials exist to
/// attach a tier and optional rate limit, not to gate access policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// SHA-256 hash of the caller's API key
    pub key_hash: String,

    /// Human-readable name for the credential
    pub name: String,

    /// Tier label; defaults to `customer`
    #[serde(default)]
    pub tier: Tier,

    /// Optional explicit rate limit, overriding the tier ceiling
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Whether this credential is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Rate limiting configuration for a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,

    /// Maximum burst size (allows temporary spikes)
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8100
}

fn default_verify_ssl() -> bool {
    true
}

fn default_unary_timeout() -> u64 {
    30
}

fn default_stream_timeout() -> u64 {
    120
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

fn default_burst() -> u32 {
    10
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_gateway::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("config.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        // Expand environment variables
        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = serde_yaml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings from environment variables (env vars take precedence).
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }

        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(verify_ssl_str) = std::env::var("VERIFY_SSL") {
            self.verify_ssl = str_to_bool(&verify_ssl_str);
        }

        if let Ok(timeout_str) = std::env::var("UNARY_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                self.unary_timeout_secs = timeout;
            }
        }

        if let Ok(timeout_str) = std::env::var("STREAM_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                self.stream_timeout_secs = timeout;
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            server: ServerConfig::default(),
            verify_ssl: default_verify_ssl(),
            unary_timeout_secs: default_unary_timeout(),
            stream_timeout_secs: default_stream_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            credentials: Vec::new(),
        }
    }
}

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    let re = Regex::new(r#"["']?\$\{([^}:]+)(?::?-?([^}]*))?\}["']?"#).unwrap();

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
    })
    .to_string()
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("true"));
        assert!(str_to_bool("TRUE"));
        assert!(str_to_bool("1"));
        assert!(str_to_bool("yes"));
        assert!(str_to_bool("on"));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("0"));
        assert!(!str_to_bool("off"));
        assert!(!str_to_bool("anything"));
    }

    #[test]
    fn test_completions_url_normalizes_trailing_slash() {
        let endpoint = EndpointConfig {
            name: "a".to_string(),
            base_url: "https://ai.example.com/api/v1/".to_string(),
        };
        assert_eq!(
            endpoint.completions_url(),
            "https://ai.example.com/api/v1/chat/completions"
        );
    }

    #[test]
    #[serial]
    fn test_load_minimal_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
endpoints:
  - name: primary
    base_url: https://ai-1.example.com/api/v1
  - name: secondary
    base_url: https://ai-2.example.com/api/v1
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].name, "primary");
        assert_eq!(config.server.port, 8100);
        assert_eq!(config.unary_timeout_secs, 30);
        assert_eq!(config.stream_timeout_secs, 120);
        assert_eq!(config.cache_ttl_secs, 300);
        assert!(config.verify_ssl);
        assert!(config.credentials.is_empty());
    }

    #[test]
    #[serial]
    fn test_endpoint_order_is_preserved() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
endpoints:
  - name: c
    base_url: http://c
  - name: a
    base_url: http://a
  - name: b
    base_url: http://b
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        let names: Vec<&str> = config.endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    #[serial]
    fn test_env_var_expansion_with_default() {
        std::env::remove_var("GATEWAY_TEST_MISSING");
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
endpoints:
  - name: primary
    base_url: ${{GATEWAY_TEST_MISSING:-http://fallback.example.com}}
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.endpoints[0].base_url, "http://fallback.example.com");
    }

    #[test]
    #[serial]
    fn test_env_var_expansion_from_environment() {
        std::env::set_var("GATEWAY_TEST_BASE", "http://from-env.example.com");
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
endpoints:
  - name: primary
    base_url: ${{GATEWAY_TEST_BASE}}
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.endpoints[0].base_url, "http://from-env.example.com");
        std::env::remove_var("GATEWAY_TEST_BASE");
    }

    #[test]
    #[serial]
    fn test_env_overrides_take_precedence() {
        std::env::set_var("PORT", "9999");
        std::env::set_var("VERIFY_SSL", "false");
        std::env::set_var("UNARY_TIMEOUT_SECS", "15");

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  port: 8100
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9999);
        assert!(!config.verify_ssl);
        assert_eq!(config.unary_timeout_secs, 15);

        std::env::remove_var("PORT");
        std::env::remove_var("VERIFY_SSL");
        std::env::remove_var("UNARY_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_credential_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
credentials:
  - key_hash: abc123
    name: acme
  - key_hash: def456
    name: bigcorp
    tier: business
    rate_limit:
      requests_per_second: 50
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.credentials[0].tier, Tier::Customer);
        assert!(config.credentials[0].enabled);
        assert!(config.credentials[0].rate_limit.is_none());

        assert_eq!(config.credentials[1].tier, Tier::Business);
        let rl = config.credentials[1].rate_limit.as_ref().unwrap();
        assert_eq!(rl.requests_per_second, 50);
        assert_eq!(rl.burst_size, 10);
    }
}
