//! Request and response bodies of the REST API.

pub mod admin;
pub mod v1;
