use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::ModelRating;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RateRequest {
    pub session_id: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RatingResponse {
    pub session_id: String,
    pub model: String,
    pub rating: i64,
}

impl ModelRating {
    pub fn to_response(&self) -> RatingResponse {
        RatingResponse {
            session_id: self.session_id.clone(),
            model: self.model_name.clone(),
            rating: self.rating,
        }
    }
}
