//! API-token authentication.
//!
//! Tokens are accepted as `Authorization: Bearer <token>` or, for browser
//! WebSocket handshakes that cannot set headers, as a `?token=` query
//! parameter.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::entities::{User, UserStore};
use crate::error::ServerError;
use crate::state::AppState;

/// Extract the caller's token from the headers or the query string.
pub fn request_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }
    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, v)| k == "token" && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

/// Resolve a token to its user.
pub async fn authenticate(state: &AppState, token: Option<String>) -> Result<User, ServerError> {
    let token = token.ok_or(ServerError::Unauthorized)?;
    match state.store.get_user_by_token(&token).await? {
        Some(user) => Ok(user),
        None => {
            debug!("rejected unknown API token");
            Err(ServerError::Unauthorized)
        }
    }
}

/// Reject requests without a valid token; otherwise attach the [`User`] as a
/// request extension.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request_token(req.headers(), req.uri().query());
    let user = authenticate(&state, token).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Must run after [`require_user`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ServerError> {
    match req.extensions().get::<User>() {
        Some(user) if user.is_admin => Ok(next.run(req).await),
        Some(_) => Err(ServerError::Forbidden("admin privileges required".into())),
        None => Err(ServerError::Unauthorized),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok-a"));
        assert_eq!(request_token(&headers, Some("token=tok-b")).as_deref(), Some("tok-a"));
    }

    #[test]
    fn query_token_is_decoded() {
        let headers = HeaderMap::new();
        assert_eq!(
            request_token(&headers, Some("x=1&token=a%2Bb")).as_deref(),
            Some("a+b")
        );
        assert_eq!(request_token(&headers, Some("token=")), None);
        assert_eq!(request_token(&headers, None), None);
    }
}
