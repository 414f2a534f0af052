//! Caller authorization.
//!
//! The gateway does not validate key format or own any auth policy: the
//! caller's key is forwarded verbatim to the upstream authorization
//! header. Configured credentials only attach a tier label (for rate-limit
//! magnitude and logging) to keys the operator knows about; a configured
//! credential can also be disabled outright.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use crate::core::config::{CredentialConfig, Tier};
use crate::core::error::GatewayError;

/// The validated caller identity: opaque key plus tier label.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The caller's raw API key, forwarded upstream
    pub key: String,
    /// Tier used for rate-limit magnitude, never for routing
    pub tier: Tier,
    /// Credential name when the key is configured, for logging
    pub name: Option<String>,
}

impl Identity {
    /// Stable hash of the caller's key, used as the rate-limiter index.
    pub fn key_hash(&self) -> String {
        hash_key(&self.key)
    }
}

/// Hash a key for lookup and storage using SHA-256.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract and authorize the bearer key from request headers.
pub fn authorize(
    headers: &HeaderMap,
    credentials: &[CredentialConfig],
) -> Result<Identity, GatewayError> {
    let raw = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or(GatewayError::Unauthorized)?;

    let key = raw
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::Unauthorized)?
        .trim();

    authorize_key(key, credentials)
}

/// Authorize a raw key string (used by the websocket handshake, where the
/// credential arrives in the first message rather than a header).
pub fn authorize_key(
    key: &str,
    credentials: &[CredentialConfig],
) -> Result<Identity, GatewayError> {
    if key.is_empty() {
        return Err(GatewayError::Unauthorized);
    }

    let key_hash = hash_key(key);
    for credential in credentials {
        if credential.key_hash == key_hash {
            if !credential.enabled {
                tracing::warn!(credential = %credential.name, "Disabled credential rejected");
                return Err(GatewayError::Unauthorized);
            }
            tracing::debug!(
                credential = %credential.name,
                tier = %credential.tier,
                "Request authenticated with configured credential"
            );
            return Ok(Identity {
                key: key.to_string(),
                tier: credential.tier,
                name: Some(credential.name.clone()),
            });
        }
    }

    // Unknown keys pass through with the default tier: upstream decides
    // whether the key is actually valid.
    Ok(Identity {
        key: key.to_string(),
        tier: Tier::default(),
        name: None,
    })
}
