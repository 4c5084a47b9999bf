//! In-memory store implementing all three storage contracts. Backs the test
//! suite and doubles as a throwaway dev backend; behavior mirrors the
//! Postgres implementation, including the collapsed token miss and the
//! all-or-nothing entry rewrites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::auth::{digest, Token};
use crate::models::{User, Workout};

use super::{StoreError, StoreResult, Stores, TokenStore, UserStore, WorkoutStore};

struct TokenRow {
    hash: Vec<u8>,
    user_id: i64,
    scope: String,
    expiry: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemStore {
    users: RwLock<HashMap<i64, User>>,
    tokens: RwLock<Vec<TokenRow>>,
    workouts: RwLock<HashMap<i64, Workout>>,
    next_user_id: AtomicI64,
    next_workout_id: AtomicI64,
    next_entry_id: AtomicI64,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The same instance serving all three contracts.
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            users: self.clone(),
            tokens: self.clone(),
            workouts: self.clone(),
        }
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl UserStore for MemStore {
    async fn create(&self, user: &mut User) -> StoreResult<()> {
        let mut users = self.users.write();
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {}", user.username)));
        }
        user.id = Self::next_id(&self.next_user_id);
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn search_by_username(&self, pattern: &str) -> StoreResult<Vec<User>> {
        let needle = pattern.to_lowercase();
        let mut found: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by_key(|u| u.id);
        Ok(found)
    }

    async fn update(&self, user: &mut User) -> StoreResult<()> {
        let mut users = self.users.write();
        let existing = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        user.updated_at = Utc::now();
        *existing = user.clone();
        Ok(())
    }

    async fn get_by_token(&self, scope: &str, plaintext: &str) -> StoreResult<User> {
        let hash = digest(plaintext);
        let now = Utc::now();
        let user_id = self
            .tokens
            .read()
            .iter()
            .find(|t| t.hash == hash && t.scope == scope && t.expiry > now)
            .map(|t| t.user_id)
            .ok_or(StoreError::NotFound)?;
        self.users
            .read()
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemStore {
    async fn insert(&self, token: &Token) -> StoreResult<()> {
        self.tokens.write().push(TokenRow {
            hash: token.hash.clone(),
            user_id: token.user_id,
            scope: token.scope.clone(),
            expiry: token.expiry,
        });
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> StoreResult<()> {
        self.tokens
            .write()
            .retain(|t| !(t.user_id == user_id && t.scope == scope));
        Ok(())
    }
}

#[async_trait]
impl WorkoutStore for MemStore {
    async fn create(&self, workout: &mut Workout) -> StoreResult<()> {
        workout.id = Self::next_id(&self.next_workout_id);
        let now = Utc::now();
        workout.created_at = now;
        workout.updated_at = now;
        for entry in &mut workout.entries {
            entry.id = Self::next_id(&self.next_entry_id);
            entry.workout_id = workout.id;
            entry.created_at = now;
            entry.updated_at = now;
        }
        self.workouts.write().insert(workout.id, workout.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> StoreResult<Workout> {
        self.workouts
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, workout: &mut Workout) -> StoreResult<()> {
        let mut workouts = self.workouts.write();
        let existing = workouts.get_mut(&workout.id).ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        workout.user_id = existing.user_id;
        workout.created_at = existing.created_at;
        workout.updated_at = now;
        for entry in &mut workout.entries {
            entry.id = Self::next_id(&self.next_entry_id);
            entry.workout_id = workout.id;
            entry.created_at = now;
            entry.updated_at = now;
        }
        *existing = workout.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        match self.workouts.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn owner(&self, id: i64) -> StoreResult<i64> {
        self.workouts
            .read()
            .get(&id)
            .map(|w| w.user_id)
            .ok_or(StoreError::NotFound)
    }
}
