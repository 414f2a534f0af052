//! Logging utilities with endpoint context support.
//!
//! This module provides context-aware logging that can include the upstream
//! endpoint currently being attempted and a per-request id in log records
//! without threading either value through every function call.

tokio::task_local! {
    /// Task-local storage for the current request ID.
    pub static REQUEST_ID: String;
}

tokio::task_local! {
    /// Task-local storage for the upstream endpoint currently being attempted.
    pub static ENDPOINT_CONTEXT: String;
}

tokio::task_local! {
    /// Task-local storage for the current credential name.
    pub static API_KEY_NAME: String;
}

/// Get the current request ID from context, if set.
///
/// Returns an empty string if no request ID is set.
pub fn get_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

/// Get the current endpoint name from context, if set.
///
/// Returns an empty string if no endpoint context is set.
pub fn get_endpoint_context() -> String {
    ENDPOINT_CONTEXT
        .try_with(|ctx| ctx.clone())
        .unwrap_or_default()
}

/// Get the current credential name from context, if set.
///
/// Returns "anonymous" if no credential name is set.
pub fn get_api_key_name() -> String {
    API_KEY_NAME
        .try_with(|name| name.clone())
        .unwrap_or_else(|_| "anonymous".to_string())
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
