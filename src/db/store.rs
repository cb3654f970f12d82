use std::fmt;

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::errors::{AppError, AppResult};

/// Address of a single document: a collection path plus a document id.
///
/// Collection paths may be nested (`users/{userId}/quizzes`), so a full path
/// always alternates collection and document segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: &str, id: &str) -> AppResult<Self> {
        validate_segment(collection)?;
        validate_document_id(id)?;
        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// A document in a subcollection nested under this document.
    pub fn child(&self, collection: &str, id: &str) -> AppResult<Self> {
        validate_segment(collection)?;
        validate_document_id(id)?;
        Ok(Self {
            collection: format!("{}/{}", self.path(), collection),
            id: id.to_string(),
        })
    }

    /// Path of a subcollection nested under this document.
    pub fn subcollection(&self, collection: &str) -> AppResult<String> {
        validate_segment(collection)?;
        Ok(format!("{}/{}", self.path(), collection))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last segment of the collection path, e.g. `quizzes`.
    pub fn leaf_collection(&self) -> &str {
        leaf_of(&self.collection)
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub(crate) fn leaf_of(collection: &str) -> &str {
    collection.rsplit('/').next().unwrap_or(collection)
}

/// Document ids come from user input in several routes; they must be a
/// single, non-empty path segment.
pub fn validate_document_id(id: &str) -> AppResult<()> {
    if id.trim().is_empty() {
        return Err(AppError::ValidationError("Document id must not be empty".to_string()));
    }
    if id.contains('/') {
        return Err(AppError::ValidationError(format!(
            "Document id '{}' must not contain '/'",
            id
        )));
    }
    Ok(())
}

fn validate_segment(collection: &str) -> AppResult<()> {
    if collection.is_empty() || collection.split('/').any(|s| s.is_empty()) {
        return Err(AppError::InternalError(format!(
            "Invalid collection path '{}'",
            collection
        )));
    }
    Ok(())
}

/// Writes buffered by a transaction until commit.
#[derive(Clone, Debug, PartialEq)]
pub enum StagedWrite {
    Set(DocPath, Document),
    Update(DocPath, Document),
    Delete(DocPath),
}

impl StagedWrite {
    pub fn path(&self) -> &DocPath {
        match self {
            StagedWrite::Set(path, _) | StagedWrite::Update(path, _) | StagedWrite::Delete(path) => path,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> AppResult<Option<Document>>;

    /// Creates or replaces the document.
    async fn set(&self, path: &DocPath, doc: Document) -> AppResult<()>;

    /// Merges `fields` into an existing document; `NotFound` when absent.
    async fn update(&self, path: &DocPath, fields: Document) -> AppResult<()>;

    /// Deleting an absent document is not an error.
    async fn delete(&self, path: &DocPath) -> AppResult<()>;

    /// Every document directly inside `collection`, as `(id, document)`.
    async fn list(&self, collection: &str) -> AppResult<Vec<(String, Document)>>;

    async fn begin(&self) -> AppResult<Box<dyn Transaction>>;

    async fn health_check(&self) -> AppResult<()>;
}

/// A read-modify-write unit against the store.
///
/// Reads are tracked for conflict detection and must all happen before the
/// first staged write. `commit` applies every staged write or none of them and
/// fails with `TransactionConflict` when another writer touched a document this
/// transaction read. Dropping a transaction without committing applies nothing.
#[async_trait]
pub trait Transaction: Send {
    async fn get(&mut self, path: &DocPath) -> AppResult<Option<Document>>;

    fn set(&mut self, path: DocPath, doc: Document);

    fn update(&mut self, path: DocPath, fields: Document);

    fn delete(&mut self, path: DocPath);

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn abort(self: Box<Self>) -> AppResult<()>;
}

/// Body of a transaction that may be executed more than once.
#[async_trait]
pub trait TransactionalOp: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<Self::Output>;
}

/// Runs `op` in a fresh transaction, retrying commit conflicts.
///
/// Errors raised by the body abort the transaction and are returned as-is.
/// After `max_attempts` conflicting commits the conflict itself is surfaced.
pub async fn run_in_transaction<O>(
    store: &dyn DocumentStore,
    max_attempts: u32,
    op: &O,
) -> AppResult<O::Output>
where
    O: TransactionalOp + ?Sized,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut txn = store.begin().await?;

        let output = match op.run(txn.as_mut()).await {
            Ok(output) => output,
            Err(err) => {
                if let Err(abort_err) = txn.abort().await {
                    log::warn!("{}: abort after failure also failed: {}", op.name(), abort_err);
                }
                if err.is_conflict() && attempt < max_attempts {
                    log::debug!("{}: read conflict on attempt {}, retrying", op.name(), attempt);
                    tokio::task::yield_now().await;
                    continue;
                }
                return Err(err);
            }
        };

        match txn.commit().await {
            Ok(()) => {
                if attempt > 1 {
                    log::debug!("{}: committed after {} attempts", op.name(), attempt);
                }
                return Ok(output);
            }
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                log::debug!("{}: commit conflict on attempt {}, retrying", op.name(), attempt);
                tokio::task::yield_now().await;
            }
            Err(err) => {
                if err.is_conflict() {
                    log::warn!("{}: giving up after {} conflicting attempts", op.name(), attempt);
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_path_nesting() {
        let user = DocPath::new("users", "u1").unwrap();
        let quiz = user.child("quizzes", "q1").unwrap();

        assert_eq!(quiz.collection(), "users/u1/quizzes");
        assert_eq!(quiz.id(), "q1");
        assert_eq!(quiz.leaf_collection(), "quizzes");
        assert_eq!(quiz.path(), "users/u1/quizzes/q1");
        assert_eq!(quiz.to_string(), "users/u1/quizzes/q1");
        assert_eq!(user.subcollection("quizzes").unwrap(), "users/u1/quizzes");
    }

    #[test]
    fn test_doc_path_rejects_bad_ids() {
        assert!(matches!(DocPath::new("users", ""), Err(AppError::ValidationError(_))));
        assert!(matches!(DocPath::new("users", "a/b"), Err(AppError::ValidationError(_))));
        assert!(matches!(DocPath::new("", "a"), Err(AppError::InternalError(_))));
        assert!(matches!(DocPath::new("users//x", "a"), Err(AppError::InternalError(_))));
    }

    #[test]
    fn test_staged_write_path() {
        let path = DocPath::new("quizTitles", "q1").unwrap();
        let write = StagedWrite::Delete(path.clone());
        assert_eq!(write.path(), &path);
    }

    #[tokio::test]
    async fn test_begin_failure_is_returned() {
        struct Noop;

        #[async_trait]
        impl TransactionalOp for Noop {
            type Output = ();

            fn name(&self) -> &'static str {
                "noop"
            }

            async fn run(&self, _txn: &mut dyn Transaction) -> AppResult<()> {
                Ok(())
            }
        }

        let mut store = MockDocumentStore::new();
        store
            .expect_begin()
            .times(1)
            .returning(|| Err(AppError::DatabaseError("connection refused".to_string())));

        let result = run_in_transaction(&store, 3, &Noop).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }
}
