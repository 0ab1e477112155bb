use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{ChatMessage, ChatSession, SessionParameters};

/// New chat session. Every field is optional; the model is honoured for
/// administrators only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub model: Option<String>,
    #[serde(flatten)]
    pub parameters: ParameterOverrides,
}

/// Partial sampling parameters; missing fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParameterOverrides {
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub repeat_penalty: Option<f64>,
}

impl ParameterOverrides {
    /// Overlay onto `base` and clamp the result.
    pub fn apply(self, base: SessionParameters) -> SessionParameters {
        SessionParameters {
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            top_p: self.top_p.unwrap_or(base.top_p),
            top_k: self.top_k.unwrap_or(base.top_k),
            repeat_penalty: self.repeat_penalty.unwrap_or(base.repeat_penalty),
        }
        .clamped()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParametersResponse {
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: f64,
    pub top_k: i64,
    pub repeat_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub title: String,
    pub model: String,
    pub parameters: ParametersResponse,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl SessionParameters {
    pub fn to_response(&self) -> ParametersResponse {
        ParametersResponse {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
            repeat_penalty: self.repeat_penalty,
        }
    }
}

impl ChatSession {
    pub fn to_response(&self) -> SessionResponse {
        SessionResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            model: self.model_name.clone(),
            parameters: self.parameters.to_response(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

impl ChatMessage {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            role: self.role.to_string(),
            content: self.content.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
