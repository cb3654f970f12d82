pub mod quiz;
pub mod user;
pub use quiz::{generate_quiz_id, Quiz, QuizIndex, QuizSummary};
pub use user::{derive_user_id, User};
