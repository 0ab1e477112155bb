//! Fixtures shared by unit tests across modules.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::Config;
use crate::entities::{ChatSession, SessionParameters, SessionStore, SqliteStore, User, UserStore};
use crate::generation::{InMemoryGenerationRegistry, OllamaBackend};
use crate::routes;
use crate::search::SearchAugmenter;
use crate::state::AppState;

/// In-memory store holding user `u1` ("alice", token `tok-alice`) and her
/// session `s1`.
pub async fn seeded_store() -> (SqliteStore, ChatSession) {
    let store = SqliteStore::connect_in_memory().await.unwrap();
    let now = Utc::now();
    store
        .create_user(User {
            id: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            api_token: "tok-alice".into(),
            is_admin: false,
            created_at: now,
        })
        .await
        .unwrap();
    let session = ChatSession {
        id: "s1".into(),
        user_id: "u1".into(),
        model_name: "tinyllama".into(),
        title: "Chat with tinyllama".into(),
        parameters: SessionParameters::default(),
        created_at: now,
        updated_at: now,
    };
    store.create_session(session.clone()).await.unwrap();
    (store, session)
}

/// Add an administrator `u0` ("root", token `tok-root`).
pub async fn add_admin(store: &SqliteStore) {
    store
        .create_user(User {
            id: "u0".into(),
            username: "root".into(),
            email: "root@example.com".into(),
            api_token: "tok-root".into(),
            is_admin: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// Router over a seeded store (alice plus the `root` admin) with an
/// unreachable generation backend and search pacing disabled.
pub async fn test_app() -> (Router, Arc<AppState>) {
    let (store, _) = seeded_store().await;
    add_admin(&store).await;

    let mut config = Config::from_env();
    config.search_pacing = false;
    config.enable_swagger = false;
    let backend = OllamaBackend::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let augmenter = SearchAugmenter::new(
        "http://127.0.0.1:9/html/",
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .unwrap();
    let registry = Arc::new(InMemoryGenerationRegistry::new());

    let state = Arc::new(AppState::new(config, store, backend, augmenter, registry));
    (routes::build(Arc::clone(&state)), state)
}

/// Send one request and decode the JSON response body (`Null` when empty).
pub async fn call(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
