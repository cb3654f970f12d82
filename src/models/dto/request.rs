use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

// Every field defaults so that an absent field reaches validation and is
// reported as a validation error rather than a body parse failure.

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,

    #[validate(length(min = 1, message = "role is required"))]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,

    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,

    #[validate(required(message = "questions must be an array"))]
    pub questions: Option<Vec<Value>>,

    #[validate(required(message = "requiredFields must be an array"))]
    pub required_fields: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ToggleQuizRequest {
    #[validate(length(min = 1, message = "quizId is required"))]
    pub quiz_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_register_request() {
        let request = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@x.com".to_string(),
            password: "pw123".to_string(),
            role: "student".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_missing_fields() {
        let request: RegisterRequest =
            serde_json::from_value(json!({ "email": "alice@x.com", "password": "pw" })).unwrap();
        let errors = request.validate().unwrap_err();

        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("role"));
        assert!(!fields.contains_key("password"));
    }

    #[test]
    fn test_only_presence_is_checked() {
        let request = RegisterRequest {
            name: "n".repeat(500),
            email: "not-an-email".to_string(),
            password: "pw".to_string(),
            role: "r".repeat(500),
        };
        assert!(request.validate().is_ok());

        let request = CreateQuizRequest {
            title: "x".repeat(201),
            description: "D".to_string(),
            questions: Some(vec![]),
            required_fields: Some(vec![]),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_quiz_request_accepts_empty_question_list() {
        let request: CreateQuizRequest = serde_json::from_value(json!({
            "title": "T",
            "description": "D",
            "questions": [],
            "requiredFields": ["email"]
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        assert_eq!(request.required_fields.unwrap(), vec![json!("email")]);
    }

    #[test]
    fn test_create_quiz_request_requires_lists() {
        let request: CreateQuizRequest =
            serde_json::from_value(json!({ "title": "T", "description": "D" })).unwrap();
        let errors = request.validate().unwrap_err();

        let fields = errors.field_errors();
        assert!(fields.contains_key("questions"));
        assert!(fields.contains_key("required_fields"));
    }

    #[test]
    fn test_toggle_request_requires_quiz_id() {
        let request: ToggleQuizRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.validate().is_err());

        let request: ToggleQuizRequest =
            serde_json::from_value(json!({ "quizId": "quiz_1" })).unwrap();
        assert!(request.validate().is_ok());
    }
}
