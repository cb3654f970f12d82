use std::sync::Arc;

use mongodb::bson::Document;

use crate::{
    db::{DocPath, DocumentStore, Transaction},
    errors::AppResult,
    models::domain::{Quiz, QuizIndex},
    repositories::{decode, encode, UserRepository},
};

/// Owner copies live in this subcollection under each user document.
pub const OWNER_QUIZ_COLLECTION: &str = "quizzes";
/// Flat lookup collection holding the index copies.
pub const QUIZ_INDEX_COLLECTION: &str = "quizTitles";

/// Typed access to both copies of a quiz. Writes that touch both copies are
/// only exposed as staged writes on a transaction.
#[derive(Clone)]
pub struct QuizRepository {
    store: Arc<dyn DocumentStore>,
}

impl QuizRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn owner_copy_path(user_id: &str, quiz_id: &str) -> AppResult<DocPath> {
        UserRepository::path(user_id)?.child(OWNER_QUIZ_COLLECTION, quiz_id)
    }

    pub fn index_path(quiz_id: &str) -> AppResult<DocPath> {
        DocPath::new(QUIZ_INDEX_COLLECTION, quiz_id)
    }

    pub async fn find_index(&self, quiz_id: &str) -> AppResult<Option<QuizIndex>> {
        let path = Self::index_path(quiz_id)?;
        self.store
            .get(&path)
            .await?
            .map(|doc| decode(&path, doc))
            .transpose()
    }

    pub async fn find_owner_copy(&self, user_id: &str, quiz_id: &str) -> AppResult<Option<Quiz>> {
        let path = Self::owner_copy_path(user_id, quiz_id)?;
        self.store
            .get(&path)
            .await?
            .map(|doc| decode(&path, doc))
            .transpose()
    }

    /// Every owner copy under `user_id`, newest first.
    pub async fn list_for_owner(&self, user_id: &str) -> AppResult<Vec<Quiz>> {
        let collection = UserRepository::path(user_id)?.subcollection(OWNER_QUIZ_COLLECTION)?;
        let docs = self.store.list(&collection).await?;

        let mut quizzes = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            let path = DocPath::new(&collection, &id)?;
            quizzes.push(decode::<Quiz>(&path, doc)?);
        }
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quizzes)
    }

    pub async fn read_owner_copy(
        txn: &mut dyn Transaction,
        user_id: &str,
        quiz_id: &str,
    ) -> AppResult<Option<Quiz>> {
        let path = Self::owner_copy_path(user_id, quiz_id)?;
        txn.get(&path).await?.map(|doc| decode(&path, doc)).transpose()
    }

    /// The owner copy without decoding, so callers can pass through whatever
    /// fields it carries.
    pub async fn read_owner_copy_raw(
        txn: &mut dyn Transaction,
        user_id: &str,
        quiz_id: &str,
    ) -> AppResult<Option<Document>> {
        let path = Self::owner_copy_path(user_id, quiz_id)?;
        txn.get(&path).await
    }

    pub async fn read_index(txn: &mut dyn Transaction, quiz_id: &str) -> AppResult<Option<QuizIndex>> {
        let path = Self::index_path(quiz_id)?;
        txn.get(&path).await?.map(|doc| decode(&path, doc)).transpose()
    }

    pub fn stage_create(txn: &mut dyn Transaction, quiz: &Quiz) -> AppResult<()> {
        txn.set(Self::owner_copy_path(&quiz.user_id, &quiz.quiz_id)?, encode(quiz)?);
        txn.set(Self::index_path(&quiz.quiz_id)?, encode(&quiz.index())?);
        Ok(())
    }

    pub fn stage_visibility(
        txn: &mut dyn Transaction,
        user_id: &str,
        quiz_id: &str,
        is_public: bool,
    ) -> AppResult<()> {
        let fields = mongodb::bson::doc! { "isPublic": is_public };
        txn.update(Self::owner_copy_path(user_id, quiz_id)?, fields.clone());
        txn.update(Self::index_path(quiz_id)?, fields);
        Ok(())
    }

    pub fn stage_delete(txn: &mut dyn Transaction, user_id: &str, quiz_id: &str) -> AppResult<()> {
        txn.delete(Self::owner_copy_path(user_id, quiz_id)?);
        txn.delete(Self::index_path(quiz_id)?);
        Ok(())
    }
}
