//! Request and response models for the gateway API.
//!
//! [`CompletionRequest`] is the validation surface: the raw body is parsed
//! into it to type-check shape and bounds, but the gateway forwards (and
//! fingerprints) the raw payload itself, so fields the caller never sent
//! stay absent and unknown passthrough options survive untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::GatewayError;

/// A chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
    Tool,
}

/// One part of a multi-part message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: Value },
}

/// Message content: either a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Absent for some tool-call messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A callable tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolFunction,
}

/// The function body of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// A chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_outputs: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl CompletionRequest {
    /// Parse and validate a raw payload.
    ///
    /// Shape errors and out-of-range parameters both reject the request
    /// before it reaches the failover loop.
    pub fn validate(payload: &Value) -> Result<Self, GatewayError> {
        let request: CompletionRequest = serde_json::from_value(payload.clone())
            .map_err(|error| GatewayError::BadRequest(format!("invalid request body: {}", error)))?;

        if request.messages.is_empty() {
            return Err(GatewayError::BadRequest(
                "messages must contain at least one entry".to_string(),
            ));
        }
        if let Some(max_tokens) = request.max_tokens {
            if !(2..=4096).contains(&max_tokens) {
                return Err(GatewayError::BadRequest(
                    "max_tokens must be between 2 and 4096".to_string(),
                ));
            }
        }
        if let Some(temperature) = request.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(GatewayError::BadRequest(
                    "temperature must be between 0.0 and 2.0".to_string(),
                ));
            }
        }
        if let Some(top_p) = request.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(GatewayError::BadRequest(
                    "top_p must be between 0.0 and 1.0".to_string(),
                ));
            }
        }
        for (name, penalty) in [
            ("frequency_penalty", request.frequency_penalty),
            ("presence_penalty", request.presence_penalty),
        ] {
            if let Some(value) = penalty {
                if !(-2.0..=2.0).contains(&value) {
                    return Err(GatewayError::BadRequest(format!(
                        "{} must be between -2.0 and 2.0",
                        name
                    )));
                }
            }
        }

        Ok(request)
    }
}

/// Response for the basic health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub endpoints: usize,
    pub endpoint_info: Vec<EndpointInfo>,
}

/// Per-endpoint health info.
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub name: String,
    pub base_url: String,
}
