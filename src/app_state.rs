use std::sync::Arc;

use crate::{
    auth::{JwtService, PasswordHasher},
    config::{Config, StoreBackend},
    db::{Database, DocumentStore, MemoryDocumentStore, MongoDocumentStore},
    errors::AppResult,
    repositories::{OWNER_QUIZ_COLLECTION, QUIZ_INDEX_COLLECTION},
    services::{QuizService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub quiz_service: Arc<QuizService>,
    pub jwt_service: JwtService,
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Mongo => {
                let db = Database::connect(&config).await?;
                let store = MongoDocumentStore::new(db);
                store
                    .ensure_indexes(&[OWNER_QUIZ_COLLECTION, QUIZ_INDEX_COLLECTION])
                    .await?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                log::warn!("Using the in-memory document store; data is lost on restart");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiration_hours);
        let max_attempts = config.transaction_max_attempts;

        let user_service = Arc::new(UserService::new(
            Arc::clone(&store),
            jwt_service.clone(),
            PasswordHasher::new(config.bcrypt_cost),
            max_attempts,
        ));
        let quiz_service = Arc::new(QuizService::new(Arc::clone(&store), max_attempts));

        Self {
            user_service,
            quiz_service,
            jwt_service,
            store,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_memory_backend_builds_without_network() {
        let state = AppState::new(Config::test_config()).await.unwrap();
        assert!(state.store.health_check().await.is_ok());
        assert!(state.config.api_base_path.is_empty());
    }
}
