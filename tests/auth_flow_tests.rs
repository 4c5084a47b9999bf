//! Auth core integration tests: credential handling, token issuance and
//! resolution, and the authorization gates, exercised end to end over the
//! in-memory store. These cover both positive and negative paths.

use anyhow::Result;
use chrono::Duration;

use fitlog::auth::{self, Identity, Token, SCOPE_AUTH};
use fitlog::models::User;
use fitlog::store::memory::MemStore;
use fitlog::store::{StoreError, TokenStore, UserStore};

async fn seed_user(store: &MemStore, username: &str, password: &str) -> Result<User> {
    let mut user = User::new(username.to_string(), format!("{username}@example.com"), String::new());
    user.password.set(password)?;
    store.create(&mut user).await?;
    Ok(user)
}

#[tokio::test]
async fn issue_then_resolve_returns_the_issuing_user() -> Result<()> {
    let store = MemStore::new();
    let user = seed_user(&store, "alice77", "password1234").await?;

    let token = auth::issue_token(store.as_ref(), user.id, Duration::hours(24), SCOPE_AUTH).await?;
    assert_eq!(token.plaintext.len(), 52);
    assert_eq!(token.hash, auth::digest(&token.plaintext));

    let resolved = store.get_by_token(SCOPE_AUTH, &token.plaintext).await?;
    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.username, "alice77");
    Ok(())
}

#[tokio::test]
async fn expired_token_never_resolves() -> Result<()> {
    let store = MemStore::new();
    let user = seed_user(&store, "bob12345", "password1234").await?;

    // Already expired at issuance.
    let token = auth::issue_token(store.as_ref(), user.id, Duration::seconds(-1), SCOPE_AUTH).await?;
    let miss = store.get_by_token(SCOPE_AUTH, &token.plaintext).await;
    assert!(matches!(miss, Err(StoreError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn wrong_scope_never_resolves() -> Result<()> {
    let store = MemStore::new();
    let user = seed_user(&store, "carol99", "password1234").await?;

    let token = auth::issue_token(store.as_ref(), user.id, Duration::hours(24), "password-reset").await?;
    let miss = store.get_by_token(SCOPE_AUTH, &token.plaintext).await;
    assert!(matches!(miss, Err(StoreError::NotFound)));

    // Same token under its own scope still resolves.
    let hit = store.get_by_token("password-reset", &token.plaintext).await?;
    assert_eq!(hit.id, user.id);
    Ok(())
}

#[tokio::test]
async fn never_issued_token_does_not_resolve() -> Result<()> {
    let store = MemStore::new();
    seed_user(&store, "dave1234", "password1234").await?;

    // Syntactically valid but never inserted.
    let stray = Token::generate(1, Duration::hours(24), SCOPE_AUTH)?;
    let miss = store.get_by_token(SCOPE_AUTH, &stray.plaintext).await;
    assert!(matches!(miss, Err(StoreError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn multiple_live_tokens_coexist_for_one_user() -> Result<()> {
    let store = MemStore::new();
    let user = seed_user(&store, "erin5678", "password1234").await?;

    let first = auth::issue_token(store.as_ref(), user.id, Duration::hours(24), SCOPE_AUTH).await?;
    let second = auth::issue_token(store.as_ref(), user.id, Duration::hours(24), SCOPE_AUTH).await?;
    assert_ne!(first.plaintext, second.plaintext);

    // Issuing the second did not invalidate the first.
    assert_eq!(store.get_by_token(SCOPE_AUTH, &first.plaintext).await?.id, user.id);
    assert_eq!(store.get_by_token(SCOPE_AUTH, &second.plaintext).await?.id, user.id);
    Ok(())
}

#[tokio::test]
async fn delete_all_for_user_invalidates_live_tokens() -> Result<()> {
    let store = MemStore::new();
    let user = seed_user(&store, "frank678", "password1234").await?;

    let token = auth::issue_token(store.as_ref(), user.id, Duration::hours(24), SCOPE_AUTH).await?;
    assert!(store.get_by_token(SCOPE_AUTH, &token.plaintext).await.is_ok());

    TokenStore::delete_all_for_user(store.as_ref(), user.id, SCOPE_AUTH).await?;
    let miss = store.get_by_token(SCOPE_AUTH, &token.plaintext).await;
    assert!(matches!(miss, Err(StoreError::NotFound)));
    Ok(())
}

/// Token store whose insert always fails, for the issuance-abort path.
struct FailingTokenStore;

#[async_trait::async_trait]
impl TokenStore for FailingTokenStore {
    async fn insert(&self, _token: &Token) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("insert refused".into()))
    }

    async fn delete_all_for_user(&self, _user_id: i64, _scope: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn insert_failure_aborts_issuance() {
    let store = FailingTokenStore;
    let result = auth::issue_token(&store, 7, Duration::hours(24), SCOPE_AUTH).await;
    let err = result.expect_err("issuance must fail when the insert fails");
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn guards_enforce_authentication_and_ownership() -> Result<()> {
    let store = MemStore::new();
    let owner = seed_user(&store, "grace123", "password1234").await?;
    let other = seed_user(&store, "henry456", "password1234").await?;

    let anon = Identity::Anonymous;
    assert_eq!(auth::require_authenticated(&anon).unwrap_err().http_status(), 401);

    let authed = Identity::Authenticated(other.clone());
    assert!(auth::require_authenticated(&authed).is_ok());

    // Authenticated but not the owner: forbidden, not unauthenticated.
    let err = auth::require_owner(&authed, owner.id).unwrap_err();
    assert_eq!(err.http_status(), 403);

    let as_owner = Identity::Authenticated(owner.clone());
    assert!(auth::require_owner(&as_owner, owner.id).is_ok());
    Ok(())
}

#[tokio::test]
async fn profile_update_and_username_search() -> Result<()> {
    let store = MemStore::new();
    let mut user = seed_user(&store, "jordan55", "password1234").await?;
    seed_user(&store, "jordana9", "password1234").await?;
    seed_user(&store, "kim77777", "password1234").await?;

    user.bio = "lifting since 2020".to_string();
    store.update(&mut user).await?;
    assert_eq!(store.get_by_username("jordan55").await?.bio, "lifting since 2020");

    let found = store.search_by_username("jordan").await?;
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|u| u.username.starts_with("jordan")));

    let none = store.search_by_username("zz").await?;
    assert!(none.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() -> Result<()> {
    let store = MemStore::new();
    seed_user(&store, "isabel99", "password1234").await?;

    let mut dup = User::new("isabel99".to_string(), "other@example.com".to_string(), String::new());
    dup.password.set("password5678")?;
    let err = store.create(&mut dup).await;
    assert!(matches!(err, Err(StoreError::Conflict(_))));
    Ok(())
}
