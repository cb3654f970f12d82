use crate::errors::AppResult;

/// bcrypt hashing run on the blocking pool so request workers are not stalled.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> AppResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed)
    }

    pub async fn verify(&self, password: &str, hash: &str) -> AppResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(matches)
    }
}
