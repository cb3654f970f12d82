use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::{
    auth::{JwtService, PasswordHasher},
    db::{run_in_transaction, DocumentStore, Transaction, TransactionalOp},
    errors::{AppError, AppResult},
    models::{
        domain::{derive_user_id, User},
        dto::{
            request::{LoginRequest, RegisterRequest},
            response::{LoginResponse, UserProfile},
        },
    },
    repositories::UserRepository,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration, login and profile lookup.
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    repository: UserRepository,
    jwt_service: JwtService,
    hasher: PasswordHasher,
    max_attempts: u32,
}

struct CreateUser {
    user: User,
}

#[async_trait]
impl TransactionalOp for CreateUser {
    type Output = ();

    fn name(&self) -> &'static str {
        "create_user"
    }

    async fn run(&self, txn: &mut dyn Transaction) -> AppResult<()> {
        if UserRepository::exists_in(txn, &self.user.id).await? {
            return Err(AppError::AlreadyExists("Email already in use".to_string()));
        }
        UserRepository::stage_create(txn, &self.user)
    }
}

impl UserService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        jwt_service: JwtService,
        hasher: PasswordHasher,
        max_attempts: u32,
    ) -> Self {
        Self {
            repository: UserRepository::new(Arc::clone(&store)),
            store,
            jwt_service,
            hasher,
            max_attempts,
        }
    }

    /// Creates the account and returns its derived id.
    pub async fn register(&self, mut request: RegisterRequest) -> AppResult<String> {
        request.email = request.email.trim().to_string();
        request.validate()?;

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = User::new(&request.name, &request.email, &password_hash, &request.role);
        let user_id = user.id.clone();

        run_in_transaction(self.store.as_ref(), self.max_attempts, &CreateUser { user }).await?;

        log::info!("Registered user {}", user_id);
        Ok(user_id)
    }

    /// Both failure modes answer with the same error so that callers cannot
    /// probe which emails are registered.
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let user_id = derive_user_id(&request.email);
        let Some(user) = self.repository.find_by_id(&user_id).await? else {
            log::debug!("Login rejected for {}: no such account", user_id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !self.hasher.verify(&request.password, &user.password_hash).await? {
            log::debug!("Login rejected for {}: password mismatch", user_id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.jwt_service.create_token(&user)?;
        log::info!("User {} logged in", user_id);

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user_id,
        })
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<UserProfile> {
        self.repository
            .find_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::{store::MockDocumentStore, MemoryDocumentStore},
    };

    fn service_with(store: Arc<dyn DocumentStore>) -> UserService {
        let config = Config::test_config();
        UserService::new(
            store,
            JwtService::new(&config.jwt_secret, config.jwt_expiration_hours),
            PasswordHasher::new(config.bcrypt_cost),
            config.transaction_max_attempts,
        )
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: "student".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service_with(Arc::new(MemoryDocumentStore::new()));

        let user_id = service
            .register(register_request("alice@x.com", "pw123"))
            .await
            .unwrap();
        assert_eq!(user_id, derive_user_id("alice@x.com"));

        let response = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "pw123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.user_id, user_id);

        let claims = service.jwt_service.validate_token(&response.token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "student");
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let service = service_with(Arc::new(MemoryDocumentStore::new()));
        service
            .register(register_request("alice@x.com", "pw123"))
            .await
            .unwrap();

        let mut second = register_request("Alice@X.com", "different");
        second.name = "Someone Else".to_string();
        let result = service.register(second).await;

        assert!(matches!(result, Err(AppError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_login_failures_look_identical() {
        let service = service_with(Arc::new(MemoryDocumentStore::new()));
        service
            .register(register_request("alice@x.com", "pw123"))
            .await
            .unwrap();

        let unknown = service
            .login(LoginRequest {
                email: "bob@x.com".to_string(),
                password: "pw123".to_string(),
            })
            .await
            .unwrap_err();
        let wrong_password = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "nope".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(unknown, AppError::Unauthorized(_)));
        assert_eq!(unknown.to_string(), wrong_password.to_string());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service_with(Arc::new(MemoryDocumentStore::new()));
        let mut request = register_request("alice@x.com", "pw");
        request.role = String::new();

        let result = service.register(request).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_reported_as_bad_credentials() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::DatabaseError("connection reset".to_string())));
        let service = service_with(Arc::new(store));

        let result = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "pw".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_get_profile_not_found() {
        let service = service_with(Arc::new(MemoryDocumentStore::new()));
        let result = service.get_profile("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
