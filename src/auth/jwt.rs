use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::claims::Claims,
    errors::{AppError, AppResult},
    models::domain::User,
};

/// Issues and verifies HS256 session tokens. Verification is pure: there is
/// no revocation list, so logging out is left to the client.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_hours: i64,
}

impl JwtService {
    pub fn new(secret: &SecretString, expiration_hours: i64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation: Validation::default(),
            expiration_hours,
        }
    }

    pub fn create_token(&self, user: &User) -> AppResult<String> {
        self.encode_claims(&Claims::for_user(user, self.expiration_hours))
    }

    pub fn encode_claims(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to create JWT: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                        "malformed"
                    }
                    _ => "rejected",
                };
                log::debug!("Token verification failed ({}): {}", reason, e);
                AppError::InvalidToken("Invalid token.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> JwtService {
        let config = Config::test_config();
        JwtService::new(&config.jwt_secret, config.jwt_expiration_hours)
    }

    #[test]
    fn test_jwt_create_and_validate() {
        let jwt_service = service();

        let user = User::new("Alice", "alice@x.com", "hash", "student");
        let token = jwt_service.create_token(&user).unwrap();

        assert!(!token.is_empty());

        let claims = jwt_service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn test_jwt_invalid_token() {
        let result = service().validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_jwt_expired_token() {
        let jwt_service = service();
        let claims = Claims::new("abc", "student", -2);
        let token = jwt_service.encode_claims(&claims).unwrap();

        let result = jwt_service.validate_token(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let other = JwtService::new(&SecretString::from("another_secret".to_string()), 1);
        let token = other.encode_claims(&Claims::new("abc", "student", 1)).unwrap();

        assert!(service().validate_token(&token).is_err());
    }
}
