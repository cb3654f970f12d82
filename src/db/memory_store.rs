use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio::sync::RwLock;

use crate::{
    db::store::{DocPath, DocumentStore, StagedWrite, Transaction},
    errors::{AppError, AppResult},
};

#[derive(Clone, Debug)]
struct Entry {
    version: u64,
    // None marks a deleted document; the version still moves forward.
    doc: Option<Document>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<DocPath, Entry>,
    clock: u64,
}

impl State {
    fn version_of(&self, path: &DocPath) -> u64 {
        self.entries.get(path).map(|e| e.version).unwrap_or(0)
    }

    fn current(&self, path: &DocPath) -> Option<&Document> {
        self.entries.get(path).and_then(|e| e.doc.as_ref())
    }

    fn put(&mut self, path: DocPath, doc: Option<Document>) {
        self.clock += 1;
        let version = self.clock;
        self.entries.insert(path, Entry { version, doc });
    }

    fn apply(&mut self, write: StagedWrite) -> AppResult<()> {
        match write {
            StagedWrite::Set(path, doc) => self.put(path, Some(doc)),
            StagedWrite::Update(path, fields) => {
                let mut doc = self
                    .current(&path)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", path)))?;
                for (key, value) in fields {
                    doc.insert(key, value);
                }
                self.put(path, Some(doc));
            }
            StagedWrite::Delete(path) => {
                if self.current(&path).is_some() {
                    self.put(path, None);
                }
            }
        }
        Ok(())
    }
}

/// Process-local store with optimistic concurrency control.
///
/// Every document path carries a version; a transaction remembers the version
/// of each path it read and its commit is rejected if any of them moved.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents, across all collections.
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.entries.values().filter(|e| e.doc.is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> AppResult<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.current(path).cloned())
    }

    async fn set(&self, path: &DocPath, doc: Document) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.put(path.clone(), Some(doc));
        Ok(())
    }

    async fn update(&self, path: &DocPath, fields: Document) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.apply(StagedWrite::Update(path.clone(), fields))
    }

    async fn delete(&self, path: &DocPath) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.apply(StagedWrite::Delete(path.clone()))
    }

    async fn list(&self, collection: &str) -> AppResult<Vec<(String, Document)>> {
        let state = self.state.read().await;
        let mut items: Vec<(String, Document)> = state
            .entries
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .filter_map(|(path, entry)| entry.doc.clone().map(|doc| (path.id().to_string(), doc)))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    async fn begin(&self) -> AppResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            reads: HashMap::new(),
            writes: Vec::new(),
        }))
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    state: Arc<RwLock<State>>,
    reads: HashMap<DocPath, u64>,
    writes: Vec<StagedWrite>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, path: &DocPath) -> AppResult<Option<Document>> {
        if !self.writes.is_empty() {
            return Err(AppError::InternalError(
                "Transaction reads must precede writes".to_string(),
            ));
        }

        let state = self.state.read().await;

        // Every read must come from the same snapshot as the earlier ones.
        for (seen_path, seen) in &self.reads {
            if state.version_of(seen_path) != *seen {
                return Err(AppError::TransactionConflict(format!(
                    "Document '{}' changed during the transaction",
                    seen_path
                )));
            }
        }

        self.reads.insert(path.clone(), state.version_of(path));
        Ok(state.current(path).cloned())
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
        let MemoryTransaction { state, reads, writes } = *self;
        let mut state = state.write().await;

        for (path, seen) in &reads {
            if state.version_of(path) != *seen {
                return Err(AppError::TransactionConflict(format!(
                    "Document '{}' was modified by a concurrent transaction",
                    path
                )));
            }
        }

        // Apply to a scratch copy of the touched entries first so a failing
        // write leaves the store untouched.
        let mut scratch = State {
            entries: writes
                .iter()
                .filter_map(|w| {
                    state
                        .entries
                        .get(w.path())
                        .map(|e| (w.path().clone(), e.clone()))
                })
                .collect(),
            clock: state.clock,
        };
        for write in writes {
            scratch.apply(write)?;
        }

        state.clock = scratch.clock;
        state.entries.extend(scratch.entries);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
