use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use mongodb::error::{ErrorKind, TRANSIENT_TRANSACTION_ERROR};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Bad credentials or a missing bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// A bearer token was presented but failed verification.
    #[error("{0}")]
    InvalidToken(String),

    /// The caller is authenticated but does not own the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The owner copy and the index copy of a quiz disagree.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::TransactionConflict(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Duplicate registration is reported as a client error, not 409.
            AppError::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken(_) => StatusCode::FORBIDDEN,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::IntegrityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::TransactionConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            code: self.status_code().as_u16(),
        })
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            return AppError::TransactionConflict(err.to_string());
        }
        match *err.kind {
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                AppError::InternalError(format!("BSON conversion error: {}", err))
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::InternalError(format!("BSON serialization error: {}", err))
    }
}

impl From<mongodb::bson::de::Error> for AppError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        AppError::InternalError(format!("BSON deserialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(format!("Password hashing failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Blocking task failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::AlreadyExists("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ValidationError("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("test".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidToken("test".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Forbidden("test".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::IntegrityError("test".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::TransactionConflict("test".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_messages() {
        let err = AppError::NotFound("quiz".into());
        assert_eq!(err.to_string(), "Not found: quiz");

        let err = AppError::Unauthorized("Invalid email or password".into());
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_conflict_detection() {
        assert!(AppError::TransactionConflict("x".into()).is_conflict());
        assert!(!AppError::DatabaseError("x".into()).is_conflict());
    }
}
