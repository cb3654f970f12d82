use serde::Serialize;
use serde_json::Value;

use crate::models::domain::{QuizSummary, User};

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Account details safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub message: String,
    pub user: UserProfile,
    pub quizzes: Vec<QuizSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserOverviewResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub quizzes: Vec<QuizSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizResponse {
    pub message: String,
    pub quiz_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePublicResponse {
    pub message: String,
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct PublicQuizResponse {
    pub quiz: Value,
}
