pub mod feedback;
pub mod models;
pub mod ratings;
pub mod session;
pub mod users;
