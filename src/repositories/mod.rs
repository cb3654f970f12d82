pub mod quiz_repository;
pub mod user_repository;

pub use quiz_repository::{QuizRepository, QUIZ_INDEX_COLLECTION, OWNER_QUIZ_COLLECTION};
pub use user_repository::{UserRepository, USERS_COLLECTION};

use mongodb::bson::{self, Document};
use serde::{de::DeserializeOwned, Serialize};

use crate::{db::DocPath, errors::AppResult};

pub(crate) fn encode<T: Serialize>(value: &T) -> AppResult<Document> {
    Ok(bson::to_document(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(path: &DocPath, doc: Document) -> AppResult<T> {
    bson::from_document(doc).map_err(|e| {
        crate::errors::AppError::IntegrityError(format!("Document '{}' is malformed: {}", path, e))
    })
}
