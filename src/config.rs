use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr};

use secrecy::{ExposeSecret, SecretString};

use crate::errors::{AppError, AppResult};

const DEFAULT_JWT_SECRET: &str = "dev_secret_key_change_in_production";

const BCRYPT_COST_RANGE: RangeInclusive<u32> = 4..=31;
const JWT_EXPIRATION_HOURS_RANGE: RangeInclusive<i64> = 1..=8760;
const TRANSACTION_MAX_ATTEMPTS_RANGE: RangeInclusive<u32> = 1..=100;

/// Which document store backs the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::ValidationError(format!(
                "Unknown DOCUMENT_STORE '{}', expected 'mongo' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app_env: String,
    pub store_backend: StoreBackend,
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub api_base_path: String,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub transaction_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let store_backend = env::var("DOCUMENT_STORE")
            .ok()
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(StoreBackend::Mongo);

        Ok(Self {
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            store_backend,
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "quizhub-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            api_base_path: normalize_base_path(&env::var("API_BASE_PATH").unwrap_or_default()),
            jwt_secret: SecretString::from(
                env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            ),
            jwt_expiration_hours: bounded(
                "JWT_EXPIRATION_HOURS",
                env::var("JWT_EXPIRATION_HOURS").ok(),
                1,
                JWT_EXPIRATION_HOURS_RANGE,
            )?,
            bcrypt_cost: bounded(
                "BCRYPT_COST",
                env::var("BCRYPT_COST").ok(),
                10,
                BCRYPT_COST_RANGE,
            )?,
            transaction_max_attempts: bounded(
                "TRANSACTION_MAX_ATTEMPTS",
                env::var("TRANSACTION_MAX_ATTEMPTS").ok(),
                10,
                TRANSACTION_MAX_ATTEMPTS_RANGE,
            )?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Rejects settings that are only acceptable for local development.
    pub fn validate_for_production(&self) -> AppResult<()> {
        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == DEFAULT_JWT_SECRET {
            return Err(AppError::ValidationError(
                "JWT_SECRET is using the default value".to_string(),
            ));
        }

        if jwt_secret.len() < 32 {
            return Err(AppError::ValidationError(format!(
                "JWT_SECRET is too short ({}); at least 32 characters are required",
                jwt_secret.len()
            )));
        }

        if self.store_backend == StoreBackend::Memory {
            return Err(AppError::ValidationError(
                "DOCUMENT_STORE=memory is not durable and cannot be used in production".to_string(),
            ));
        }

        Ok(())
    }

    pub fn test_config() -> Self {
        Self {
            app_env: "test".to_string(),
            store_backend: StoreBackend::Memory,
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "quizhub-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 3000,
            api_base_path: String::new(),
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            bcrypt_cost: 4,
            transaction_max_attempts: 16,
        }
    }
}

/// Parses an optional numeric setting; an unset variable takes `default`,
/// anything unparsable or outside `range` is rejected.
fn bounded<T>(name: &str, raw: Option<String>, default: T, range: RangeInclusive<T>) -> AppResult<T>
where
    T: FromStr + PartialOrd + Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    let value: T = raw.trim().parse().map_err(|_| {
        AppError::ValidationError(format!("{} must be a number, got '{}'", name, raw))
    })?;

    if !range.contains(&value) {
        return Err(AppError::ValidationError(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )));
    }
    Ok(value)
}

/// `"api/"` and `"/api"` both become `"/api"`; blank stays blank.
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
