//! Storage contracts consumed by the core. Each capability is a trait with
//! swappable implementations: a Postgres backend for production and an
//! in-memory one for tests. A backend failure is kept distinct from a plain
//! miss so an outage never logs as an authentication failure, even though
//! both end the request.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Token;
use crate::error::AppError;
use crate::models::{User, Workout};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("storage backend failure: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => {
                AppError::not_found("not_found", "The requested resource could not be found.")
            }
            StoreError::Conflict(_) => {
                AppError::conflict("conflict", "A conflicting record already exists.")
            }
            StoreError::Unavailable(_) => AppError::internal(
                "storage_failure",
                "An unexpected error occurred. Please try again later.",
            ),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user; assigns id and timestamps on success.
    async fn create(&self, user: &mut User) -> StoreResult<()>;
    async fn get_by_username(&self, username: &str) -> StoreResult<User>;
    async fn search_by_username(&self, pattern: &str) -> StoreResult<Vec<User>>;
    async fn update(&self, user: &mut User) -> StoreResult<()>;
    /// Resolve a presented token to its user: digest the plaintext and match
    /// `(hash, scope, expiry > now)`. Unknown, wrong-scope, and expired
    /// tokens all collapse into `NotFound`.
    async fn get_by_token(&self, scope: &str, plaintext: &str) -> StoreResult<User>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Durably record a token. Issuance only returns a token to the caller
    /// after this succeeds.
    async fn insert(&self, token: &Token) -> StoreResult<()>;
    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Persist a workout and its entries all-or-nothing.
    async fn create(&self, workout: &mut Workout) -> StoreResult<()>;
    async fn get(&self, id: i64) -> StoreResult<Workout>;
    async fn update(&self, workout: &mut Workout) -> StoreResult<()>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
    /// Ownership lookup used by the authorization path.
    async fn owner(&self, id: i64) -> StoreResult<i64>;
}

/// Bundle of storage capabilities injected into the server state.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub workouts: Arc<dyn WorkoutStore>,
}
