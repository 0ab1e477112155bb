pub mod config;
pub mod export;
pub mod models;
pub mod status;
