use chrono::{DateTime, Utc};

pub const TEMPERATURE_RANGE: (f64, f64) = (0.1, 2.0);
pub const MAX_TOKENS_RANGE: (i64, i64) = (100, 4096);
pub const TOP_P_RANGE: (f64, f64) = (0.1, 1.0);
pub const TOP_K_RANGE: (i64, i64) = (1, 100);
pub const REPEAT_PENALTY_RANGE: (f64, f64) = (0.5, 2.0);

/// Sampling parameters stored with every chat session.
///
/// Values are clamped into their allowed ranges whenever they are written;
/// the generation pipeline only ever reads them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParameters {
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: f64,
    pub top_k: i64,
    pub repeat_penalty: f64,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
        }
    }
}

impl SessionParameters {
    /// Clamp every field into its allowed range.
    ///
    /// NaN inputs fall back to the lower bound.
    pub fn clamped(self) -> Self {
        Self {
            temperature: clamp_f64(self.temperature, TEMPERATURE_RANGE),
            max_tokens: self.max_tokens.clamp(MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1),
            top_p: clamp_f64(self.top_p, TOP_P_RANGE),
            top_k: self.top_k.clamp(TOP_K_RANGE.0, TOP_K_RANGE.1),
            repeat_penalty: clamp_f64(self.repeat_penalty, REPEAT_PENALTY_RANGE),
        }
    }
}

fn clamp_f64(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// A row in the `chat_sessions` table.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    /// Owner of the session.
    pub user_id: String,
    pub model_name: String,
    pub title: String,
    pub parameters: SessionParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
