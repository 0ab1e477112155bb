pub mod chat;
pub mod feedback;
pub mod rating;
pub mod session;
pub mod user;

pub use chat::{ChatMessage, MessageRole};
pub use feedback::{Feedback, FeedbackPriority, FeedbackStatus, FeedbackType};
pub use rating::ModelRating;
pub use session::{ChatSession, SessionParameters};
pub use user::User;
