//! Opaque bearer tokens: 32 bytes of CSPRNG output encoded as unpadded
//! base32 for the wire, with only the SHA-256 digest persisted. The
//! plaintext is returned to the caller exactly once at issuance.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::store::TokenStore;

/// Scope tag for login tokens. Other token kinds (e.g. password reset)
/// would use their own tag over the same storage shape.
pub const SCOPE_AUTH: &str = "authentication";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Wire form, 52 base32 characters. Never persisted.
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: String,
}

impl Token {
    /// Draw a fresh token for `user_id` expiring `ttl` from now. Fails only
    /// when secure randomness is unavailable.
    pub fn generate(user_id: i64, ttl: Duration, scope: &str) -> AppResult<Token> {
        let mut raw = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut raw).map_err(|e| {
            error!("token randomness unavailable: {e}");
            AppError::internal("randomness_error", "An unexpected error occurred.")
        })?;
        let plaintext = BASE32_NOPAD.encode(&raw);
        let hash = digest(&plaintext);
        Ok(Token {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope: scope.to_string(),
        })
    }
}

/// Fixed one-way digest deriving the storable hash from a token's plaintext.
pub fn digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Generate a token and record it durably in one step. The plaintext is only
/// handed back after the insert succeeds; an insert failure aborts issuance.
pub async fn issue_token(
    store: &dyn TokenStore,
    user_id: i64,
    ttl: Duration,
    scope: &str,
) -> AppResult<Token> {
    let token = Token::generate(user_id, ttl, scope)?;
    store.insert(&token).await.map_err(|e| {
        error!("token insert failed, aborting issuance: {e}");
        AppError::internal("token_issuance_failed", "Failed to create an authentication token due to a server error.")
    })?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_plaintext_is_52_base32_chars() {
        let t = Token::generate(1, Duration::hours(24), SCOPE_AUTH).unwrap();
        assert_eq!(t.plaintext.len(), 52);
        assert!(BASE32_NOPAD.decode(t.plaintext.as_bytes()).is_ok());
    }

    #[test]
    fn hash_is_digest_of_plaintext() {
        let t = Token::generate(7, Duration::hours(24), SCOPE_AUTH).unwrap();
        assert_eq!(t.hash, digest(&t.plaintext));
    }

    #[test]
    fn expiry_is_after_issuance_for_positive_ttl() {
        let before = Utc::now();
        let t = Token::generate(7, Duration::hours(24), SCOPE_AUTH).unwrap();
        assert!(t.expiry > before);
    }

    #[test]
    fn distinct_generations_yield_distinct_tokens() {
        let a = Token::generate(1, Duration::hours(1), SCOPE_AUTH).unwrap();
        let b = Token::generate(1, Duration::hours(1), SCOPE_AUTH).unwrap();
        assert_ne!(a.plaintext, b.plaintext);
    }

    #[test]
    fn serialized_form_exposes_only_plaintext_and_expiry() {
        let t = Token::generate(7, Duration::hours(24), SCOPE_AUTH).unwrap();
        let v = serde_json::to_value(&t).unwrap();
        let obj = v.as_object().unwrap();
        assert!(obj.contains_key("token"));
        assert!(obj.contains_key("expiry"));
        assert!(!obj.contains_key("hash"));
        assert!(!obj.contains_key("user_id"));
        assert!(!obj.contains_key("scope"));
    }
}
