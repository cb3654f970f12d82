use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A registered account, stored at `users/{id}`.
///
/// The id is the document key and is not persisted as a field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

impl User {
    pub fn new(name: &str, email: &str, password_hash: &str, role: &str) -> Self {
        User {
            id: derive_user_id(email),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password_hash: password_hash.to_string(),
            role: role.trim().to_string(),
        }
    }
}

/// Deterministic, non-reversible account id: hex SHA-256 of the normalized email.
pub fn derive_user_id(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

#[cfg(test)]
impl User {
    pub fn test_user(name: &str, email: &str) -> Self {
        User::new(name, email, "$2b$04$notarealhashnotarealhashnotarealhashnotarealhas", "student")
    }
}
