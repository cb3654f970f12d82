use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Authoritative quiz record, stored at `users/{userId}/quizzes/{quizId}`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub user_id: String,
    pub quiz_id: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<Value>,
    pub required_fields: Vec<Value>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Lookup projection of a quiz, stored at `quizTitles/{quizId}` so a quiz can
/// be found without knowing its owner.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizIndex {
    pub user_id: String,
    pub title: String,
    pub required_fields: Vec<Value>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Row of an owner's quiz listing.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub quiz_id: String,
    pub title: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    /// New quizzes always start private.
    pub fn new(
        user_id: &str,
        title: &str,
        description: &str,
        questions: Vec<Value>,
        required_fields: Vec<Value>,
    ) -> Self {
        Quiz {
            user_id: user_id.to_string(),
            quiz_id: generate_quiz_id(),
            title: title.to_string(),
            description: description.to_string(),
            questions,
            required_fields,
            is_public: false,
            created_at: Utc::now(),
        }
    }

    pub fn index(&self) -> QuizIndex {
        QuizIndex {
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            required_fields: self.required_fields.clone(),
            is_public: self.is_public,
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            quiz_id: self.quiz_id.clone(),
            title: self.title.clone(),
            is_public: self.is_public,
            created_at: self.created_at,
        }
    }
}

pub fn generate_quiz_id() -> String {
    format!("quiz_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Quiz {
        Quiz::new("owner-1", "T", "D", vec![], vec![json!("email")])
    }

    #[test]
    fn test_new_quiz_is_private() {
        let quiz = sample();

        assert!(!quiz.is_public);
        assert!(quiz.quiz_id.starts_with("quiz_"));
        assert_eq!(quiz.user_id, "owner-1");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| generate_quiz_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_index_mirrors_owner_copy() {
        let quiz = sample();
        let index = quiz.index();

        assert_eq!(index.user_id, quiz.user_id);
        assert_eq!(index.title, quiz.title);
        assert_eq!(index.required_fields, quiz.required_fields);
        assert_eq!(index.is_public, quiz.is_public);
        assert_eq!(index.created_at, quiz.created_at);
    }

    #[test]
    fn test_serialized_field_names_are_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();

        for key in ["userId", "quizId", "requiredFields", "isPublic", "createdAt"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
