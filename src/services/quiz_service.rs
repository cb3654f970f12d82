use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde_json::Value;
use validator::Validate;

use crate::{
    db::{run_in_transaction, validate_document_id, DocumentStore, Transaction, TransactionalOp},
    errors::{AppError, AppResult},
    models::{
        domain::{generate_quiz_id, Quiz, QuizSummary},
        dto::request::CreateQuizRequest,
    },
    repositories::QuizRepository,
};

const OWNER_FIELD: &str = "userId";
const MAX_ID_REGENERATIONS: usize = 3;

/// Keeps each quiz's owner copy and index copy in step.
///
/// Lifecycle per quiz id: created private, toggled any number of times, then
/// deleted. Every write that touches both copies goes through one transaction,
/// so readers never observe one copy without the other or disagreeing
/// `isPublic` flags.
pub struct QuizService {
    store: Arc<dyn DocumentStore>,
    repository: QuizRepository,
    max_attempts: u32,
}

struct CreateQuiz {
    quiz: Quiz,
}

#[async_trait]
impl TransactionalOp for CreateQuiz {
    type Output = String;

    fn name(&self) -> &'static str {
        "create_quiz"
    }

    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<String> {
        let mut quiz = self.quiz.clone();

        // Regenerated ids are read before any write is staged.
        let mut regenerations = 0;
        while QuizRepository::read_index(txn, &quiz.quiz_id).await?.is_some() {
            regenerations += 1;
            if regenerations > MAX_ID_REGENERATIONS {
                return Err(AppError::InternalError(
                    "Could not allocate a unique quiz id".to_string(),
                ));
            }
            log::warn!("Quiz id {} already taken, regenerating", quiz.quiz_id);
            quiz.quiz_id = generate_quiz_id();
        }

        QuizRepository::stage_create(txn, &quiz)?;
        Ok(quiz.quiz_id)
    }
}

struct TogglePublic<'a> {
    owner_id: &'a str,
    quiz_id: &'a str,
}

#[async_trait]
impl<'a> TransactionalOp for TogglePublic<'a> {
    type Output = bool;

    fn name(&self) -> &'static str {
        "toggle_quiz_public"
    }

    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<bool> {
        let owner_copy = QuizRepository::read_owner_copy(txn, self.owner_id, self.quiz_id).await?;
        let index = QuizRepository::read_index(txn, self.quiz_id).await?;

        let (Some(owner_copy), Some(index)) = (owner_copy, index) else {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        };
        if index.user_id != self.owner_id {
            log::warn!(
                "Quiz {} index names owner {} but owner copy is under {}",
                self.quiz_id,
                index.user_id,
                self.owner_id
            );
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let is_public = !owner_copy.is_public;
        QuizRepository::stage_visibility(txn, self.owner_id, self.quiz_id, is_public)?;
        Ok(is_public)
    }
}

struct DeleteQuiz<'a> {
    requester_id: &'a str,
    quiz_id: &'a str,
}

#[async_trait]
impl<'a> TransactionalOp for DeleteQuiz<'a> {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_quiz"
    }

    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<()> {
        let Some(index) = QuizRepository::read_index(txn, self.quiz_id).await? else {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        };
        if index.user_id != self.requester_id {
            return Err(AppError::Forbidden(
                "You can only delete your own quizzes".to_string(),
            ));
        }

        let owner_copy = QuizRepository::read_owner_copy(txn, &index.user_id, self.quiz_id).await?;
        if owner_copy.is_none() {
            log::warn!("Quiz {} had an index copy but no owner copy; removing index", self.quiz_id);
        }

        QuizRepository::stage_delete(txn, &index.user_id, self.quiz_id)
    }
}

struct ReadPublicQuiz<'a> {
    quiz_id: &'a str,
}

#[async_trait]
impl<'a> TransactionalOp for ReadPublicQuiz<'a> {
    type Output = Document;

    fn name(&self) -> &'static str {
        "read_public_quiz"
    }

    /// Both copies are read from one snapshot.
    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<Document> {
        let Some(index) = QuizRepository::read_index(txn, self.quiz_id).await? else {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        };
        if !index.is_public {
            return Err(AppError::Forbidden("This quiz is not public".to_string()));
        }

        QuizRepository::read_owner_copy_raw(txn, &index.user_id, self.quiz_id)
            .await?
            .ok_or_else(|| {
                log::error!("Quiz {} is indexed but its owner copy is missing", self.quiz_id);
                AppError::IntegrityError("Quiz data is missing".to_string())
            })
    }
}

impl QuizService {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            repository: QuizRepository::new(Arc::clone(&store)),
            store,
            max_attempts,
        }
    }

    pub async fn create(&self, owner_id: &str, request: CreateQuizRequest) -> AppResult<String> {
        request.validate()?;

        let quiz = Quiz::new(
            owner_id,
            &request.title,
            &request.description,
            request.questions.unwrap_or_default(),
            request.required_fields.unwrap_or_default(),
        );

        let quiz_id =
            run_in_transaction(self.store.as_ref(), self.max_attempts, &CreateQuiz { quiz }).await?;

        log::info!("User {} created quiz {}", owner_id, quiz_id);
        Ok(quiz_id)
    }

    /// Flips `isPublic` on both copies and returns the new value.
    pub async fn toggle_public(&self, owner_id: &str, quiz_id: &str) -> AppResult<bool> {
        validate_document_id(quiz_id)?;

        let is_public = run_in_transaction(
            self.store.as_ref(),
            self.max_attempts,
            &TogglePublic { owner_id, quiz_id },
        )
        .await?;

        log::info!("Quiz {} is now {}", quiz_id, if is_public { "public" } else { "private" });
        Ok(is_public)
    }

    pub async fn delete(&self, requester_id: &str, quiz_id: &str) -> AppResult<()> {
        validate_document_id(quiz_id)?;

        run_in_transaction(
            self.store.as_ref(),
            self.max_attempts,
            &DeleteQuiz { requester_id, quiz_id },
        )
        .await?;

        log::info!("User {} deleted quiz {}", requester_id, quiz_id);
        Ok(())
    }

    /// Public view of a quiz: the owner copy without its owner id.
    pub async fn get_public(&self, quiz_id: &str) -> AppResult<Value> {
        validate_document_id(quiz_id)?;

        let mut owner_copy =
            run_in_transaction(self.store.as_ref(), self.max_attempts, &ReadPublicQuiz { quiz_id })
                .await?;

        owner_copy.remove(OWNER_FIELD);
        if owner_copy.is_empty() {
            log::error!("Quiz {} owner copy is empty", quiz_id);
            return Err(AppError::IntegrityError("Quiz data is empty".to_string()));
        }

        Ok(Bson::Document(owner_copy).into_relaxed_extjson())
    }

    /// Reads the owner's own subcollection; the index collection is not consulted.
    pub async fn list_for_owner(&self, owner_id: &str) -> AppResult<Vec<QuizSummary>> {
        let quizzes = self.repository.list_for_owner(owner_id).await?;
        Ok(quizzes.iter().map(Quiz::summary).collect())
    }

    pub async fn list_public_for_owner(&self, owner_id: &str) -> AppResult<Vec<QuizSummary>> {
        let quizzes = self.list_for_owner(owner_id).await?;
        Ok(quizzes.into_iter().filter(|q| q.is_public).collect())
    }
}
