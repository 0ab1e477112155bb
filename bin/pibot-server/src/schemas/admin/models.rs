use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PullModelRequest {
    /// Backend model tag, e.g. `phi3:mini`.
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PullModelResponse {
    pub message: String,
}
