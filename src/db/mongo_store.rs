use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::{Acknowledgment, ReadConcern, TransactionOptions, WriteConcern},
    ClientSession, Collection,
};

use crate::{
    db::{
        store::{leaf_of, DocPath, DocumentStore, StagedWrite, Transaction},
        Database,
    },
    errors::{AppError, AppResult},
};

const ID_FIELD: &str = "_id";
const PARENT_FIELD: &str = "_parent";
const MAX_COMMIT_RETRIES: u32 = 3;

/// Document store on top of MongoDB.
///
/// A document at `users/u1/quizzes/q1` lives in the `quizzes` collection with
/// `_id = "users/u1/quizzes/q1"` and `_parent = "users/u1/quizzes"`, so a
/// subcollection listing is a single indexed filter on `_parent`.
#[derive(Clone)]
pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, path: &DocPath) -> Collection<Document> {
        self.db.get_collection(path.leaf_collection())
    }

    pub async fn ensure_indexes(&self, leaf_collections: &[&str]) -> AppResult<()> {
        use mongodb::IndexModel;

        for name in leaf_collections {
            let model = IndexModel::builder().keys(doc! { PARENT_FIELD: 1 }).build();
            self.db
                .get_collection::<Document>(name)
                .create_index(model)
                .await?;
            log::info!("Created index on {}.{}", name, PARENT_FIELD);
        }
        Ok(())
    }
}

fn to_stored(path: &DocPath, mut doc: Document) -> Document {
    doc.insert(ID_FIELD, path.path());
    doc.insert(PARENT_FIELD, path.collection());
    doc
}

fn from_stored(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc.remove(PARENT_FIELD);
    doc
}

/// `(id, document)` for a stored document directly inside `collection`.
fn listed_entry(collection: &str, doc: Document) -> Option<(String, Document)> {
    let id = doc
        .get_str(ID_FIELD)
        .ok()?
        .strip_prefix(collection)?
        .strip_prefix('/')?
        .to_string();
    if id.contains('/') {
        return None;
    }
    Some((id, from_stored(doc)))
}

fn id_filter(path: &DocPath) -> Document {
    doc! { ID_FIELD: path.path() }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get(&self, path: &DocPath) -> AppResult<Option<Document>> {
        let found = self.collection(path).find_one(id_filter(path)).await?;
        Ok(found.map(from_stored))
    }

    async fn set(&self, path: &DocPath, doc: Document) -> AppResult<()> {
        self.collection(path)
            .replace_one(id_filter(path), to_stored(path, doc))
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn update(&self, path: &DocPath, fields: Document) -> AppResult<()> {
        let result = self
            .collection(path)
            .update_one(id_filter(path), doc! { "$set": fields })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Document '{}' not found", path)));
        }
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> AppResult<()> {
        self.collection(path).delete_one(id_filter(path)).await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> AppResult<Vec<(String, Document)>> {
        let cursor = self
            .db
            .get_collection::<Document>(leaf_of(collection))
            .find(doc! { PARENT_FIELD: collection })
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;

        let mut items: Vec<(String, Document)> = docs
            .into_iter()
            .filter_map(|doc| listed_entry(collection, doc))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    async fn begin(&self) -> AppResult<Box<dyn Transaction>> {
        let mut session = self.db.client().start_session().await?;

        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        session.start_transaction().with_options(options).await?;

        Ok(Box::new(MongoTransaction {
            store: self.clone(),
            session,
            writes: Vec::new(),
        }))
    }

    async fn health_check(&self) -> AppResult<()> {
        self.db.health_check().await
    }
}

/// Reads run inside the session's snapshot; writes are buffered and sent in
/// order at commit. Write conflicts surface as `TransientTransactionError`,
/// which the error conversion maps to `TransactionConflict`.
pub struct MongoTransaction {
    store: MongoDocumentStore,
    session: ClientSession,
    writes: Vec<StagedWrite>,
}

impl MongoTransaction {
    async fn apply(&mut self, write: StagedWrite) -> AppResult<()> {
        let collection = self.store.collection(write.path());
        match write {
            StagedWrite::Set(path, doc) => {
                collection
                    .replace_one(id_filter(&path), to_stored(&path, doc))
                    .upsert(true)
                    .session(&mut self.session)
                    .await?;
            }
            StagedWrite::Update(path, fields) => {
                let result = collection
                    .update_one(id_filter(&path), doc! { "$set": fields })
                    .session(&mut self.session)
                    .await?;
                if result.matched_count == 0 {
                    return Err(AppError::NotFound(format!("Document '{}' not found", path)));
                }
            }
            StagedWrite::Delete(path) => {
                collection
                    .delete_one(id_filter(&path))
                    .session(&mut self.session)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MongoTransaction {
    async fn get(&mut self, path: &DocPath) -> AppResult<Option<Document>> {
        if !self.writes.is_empty() {
            return Err(AppError::InternalError(
                "Transaction reads must precede writes".to_string(),
            ));
        }

        let found = self
            .store
            .collection(path)
            .find_one(id_filter(path))
            .session(&mut self.session)
            .await?;
        Ok(found.map(from_stored))
    }

    fn set(&mut self, path: DocPath, doc: Document) {
        self.writes.push(StagedWrite::Set(path, doc));
    }

    fn update(&mut self, path: DocPath, fields: Document) {
        self.writes.push(StagedWrite::Update(path, fields));
    }

    fn delete(&mut self, path: DocPath) {
        self.writes.push(StagedWrite::Delete(path));
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = self;
        let writes = std::mem::take(&mut this.writes);
        for write in writes {
            if let Err(err) = this.apply(write).await {
                if let Err(abort_err) = this.session.abort_transaction().await {
                    log::warn!("Abort after failed write also failed: {}", abort_err);
                }
                return Err(err);
            }
        }

        let mut retries = 0;
        loop {
            match this.session.commit_transaction().await {
                Ok(()) => return Ok(()),
                // Re-committing is idempotent and must not re-run the body.
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && retries < MAX_COMMIT_RETRIES =>
                {
                    retries += 1;
                    log::warn!("Commit result unknown, retrying commit ({}): {}", retries, err);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        let mut this = self;
        this.session.abort_transaction().await?;
        Ok(())
    }
}
