//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for pibot-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://pibot.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Base URL of the Ollama-compatible generation backend.
    pub ollama_url: String,

    /// Model used when neither the request nor the config store names one.
    pub default_model: String,

    /// Ceiling over one whole generation request, connect included.
    pub backend_timeout: Duration,

    /// HTML search endpoint queried for prompt augmentation.
    pub search_url: String,

    /// Timeout for the search result page.
    pub search_timeout: Duration,

    /// Timeout for each result page fetched for a snippet.
    pub snippet_timeout: Duration,

    /// When `false`, the cosmetic pauses between search progress events are
    /// skipped.
    pub search_pacing: bool,

    /// Comma-separated CORS allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui` (default: `true`).
    pub enable_swagger: bool,

    /// Username of the bootstrap administrator account.
    pub admin_username: String,

    /// API token of the bootstrap administrator. Generated on first start
    /// when unset.
    pub admin_token: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("PIBOT_BIND", "0.0.0.0:8080"),
            database_url: env_or("PIBOT_DATABASE_URL", "sqlite://pibot.db?mode=rwc"),
            log_level: env_or("PIBOT_LOG", "info"),
            log_json: env_flag("PIBOT_LOG_JSON", false),
            ollama_url: env_or("PIBOT_OLLAMA_URL", "http://localhost:11434"),
            default_model: env_or("PIBOT_DEFAULT_MODEL", "tinyllama"),
            backend_timeout: Duration::from_secs(parse_env("PIBOT_BACKEND_TIMEOUT_SECS", 120)),
            search_url: env_or("PIBOT_SEARCH_URL", "https://html.duckduckgo.com/html/"),
            search_timeout: Duration::from_secs(parse_env("PIBOT_SEARCH_TIMEOUT_SECS", 10)),
            snippet_timeout: Duration::from_secs(parse_env("PIBOT_SNIPPET_TIMEOUT_SECS", 5)),
            search_pacing: env_flag("PIBOT_SEARCH_PACING", true),
            cors_allowed_origins: std::env::var("PIBOT_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("PIBOT_ENABLE_SWAGGER", true),
            admin_username: env_or("PIBOT_ADMIN_USERNAME", "admin"),
            admin_token: std::env::var("PIBOT_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("on")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("on"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
    }
}
