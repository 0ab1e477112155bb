//! HTTP middleware stack: token auth, CORS and per-request trace ids.

pub mod auth;
pub mod cors;
pub mod trace;
