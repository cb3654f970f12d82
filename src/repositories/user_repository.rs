use std::sync::Arc;

use mongodb::bson::Document;

use crate::{
    db::{DocPath, DocumentStore, Transaction},
    errors::AppResult,
    models::domain::User,
    repositories::{decode, encode},
};

pub const USERS_COLLECTION: &str = "users";

/// Typed access to `users/{userId}`.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn path(user_id: &str) -> AppResult<DocPath> {
        DocPath::new(USERS_COLLECTION, user_id)
    }

    pub async fn find_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        let path = Self::path(user_id)?;
        match self.store.get(&path).await? {
            Some(doc) => Ok(Some(Self::decode_user(&path, doc)?)),
            None => Ok(None),
        }
    }

    pub async fn exists_in(txn: &mut dyn Transaction, user_id: &str) -> AppResult<bool> {
        let path = Self::path(user_id)?;
        Ok(txn.get(&path).await?.is_some())
    }

    pub fn stage_create(txn: &mut dyn Transaction, user: &User) -> AppResult<()> {
        txn.set(Self::path(&user.id)?, encode(user)?);
        Ok(())
    }

    fn decode_user(path: &DocPath, doc: Document) -> AppResult<User> {
        let mut user: User = decode(path, doc)?;
        user.id = path.id().to_string();
        Ok(user)
    }
}
