//! Password hashing using Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hash parameters: {0}")]
    Params(String),

    #[error("hashing failed: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id with a configurable iteration count. Digests are PHC strings,
/// so verification reads the parameters back out of the stored hash.
///
/// Request paths use the `_async` variants, which run argon2 on the
/// blocking pool instead of a runtime worker.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Digest with the live parameters, verified when no account matched so
    /// a miss costs the same as a wrong password
    dummy_digest: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(Params::DEFAULT_M_COST, cost.max(1), Params::DEFAULT_P_COST, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_digest: String::new(),
        };
        hasher.dummy_digest = hasher.hash("no-such-account")?;
        Ok(hasher)
    }

    pub async fn hash_async(self: &Arc<Self>, plaintext: &str) -> Result<String, PasswordError> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// `None` verifies against the dummy digest and always fails
    pub async fn verify_async(self: &Arc<Self>, plaintext: &str, digest: Option<&str>) -> bool {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_owned();
        let digest = digest.map(str::to_owned);
        let outcome = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&plaintext, &digest),
            None => {
                hasher.verify(&plaintext, &hasher.dummy_digest);
                false
            }
        })
        .await;
        match outcome {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "password verification task failed");
                false
            }
        }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// False on mismatch and on unparseable digests
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("stored password hash is malformed: {}", e);
                return false;
            }
        };
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::warn!("password verification error: {}", e);
                false
            }
        }
    }
}
