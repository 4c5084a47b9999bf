//! Password credential handling: Argon2 one-way hashing and verification.
//! The plaintext only transits `set`/`matches`; only the PHC-encoded hash
//! (cost parameters and salt embedded) is ever stored.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    hash: String,
}

impl Password {
    /// Rehydrate a credential from its stored PHC string.
    pub fn from_hash(hash: String) -> Self {
        Password { hash }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Replace the stored hash with a freshly salted Argon2 hash of
    /// `plaintext`. Two calls with the same plaintext produce different
    /// hashes. Non-empty plaintext is the caller's responsibility.
    pub fn set(&mut self, plaintext: &str) -> AppResult<()> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| {
            error!("salt generation failed: {e}");
            AppError::internal("hashing_error", "An unexpected error occurred.")
        })?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
            error!("salt encoding failed: {e}");
            AppError::internal("hashing_error", "An unexpected error occurred.")
        })?;
        let phc = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                error!("password hashing failed: {e}");
                AppError::internal("hashing_error", "An unexpected error occurred.")
            })?
            .to_string();
        self.hash = phc;
        Ok(())
    }

    /// Verify `candidate` against the stored hash using the scheme's own
    /// constant-time comparison. A mismatch is `Ok(false)`; only failures
    /// unrelated to the comparison itself (e.g. a corrupted stored hash)
    /// surface as errors.
    pub fn matches(&self, candidate: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(&self.hash).map_err(|e| {
            error!("stored password hash is not decodable: {e}");
            AppError::internal("verification_error", "An unexpected error occurred.")
        })?;
        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!("password verification failed: {e}");
                Err(AppError::internal("verification_error", "An unexpected error occurred."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_match_succeeds() {
        let mut p = Password::default();
        p.set("password1234").unwrap();
        assert!(p.matches("password1234").unwrap());
        assert!(!p.matches("wrongpass12").unwrap());
    }

    #[test]
    fn same_plaintext_hashes_differently() {
        let mut a = Password::default();
        let mut b = Password::default();
        a.set("password1234").unwrap();
        b.set("password1234").unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn set_replaces_previous_hash() {
        let mut p = Password::default();
        p.set("first-password").unwrap();
        p.set("second-password").unwrap();
        assert!(!p.matches("first-password").unwrap());
        assert!(p.matches("second-password").unwrap());
    }

    #[test]
    fn corrupted_hash_is_an_error_not_a_mismatch() {
        let p = Password::from_hash("not-a-phc-string".to_string());
        assert!(p.matches("anything").is_err());
    }
}
