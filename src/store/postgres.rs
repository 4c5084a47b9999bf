//! Postgres-backed stores. One shared connection drives all three
//! capabilities; multi-row workout writes run inside explicit transactions
//! so a failed statement rolls the whole write back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;

use crate::auth::{digest, Token};
use crate::models::{User, Workout, WorkoutEntry};

use super::{StoreError, StoreResult, Stores, TokenStore, UserStore, WorkoutStore};

pub type PgClient = Arc<Mutex<Client>>;

/// Connect and spawn the connection driver task.
pub async fn connect(dsn: &str) -> anyhow::Result<PgClient> {
    let (client, connection) = tokio_postgres::connect(dsn, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("postgres connection error: {e}");
        }
    });
    Ok(Arc::new(Mutex::new(client)))
}

/// The full storage bundle over one shared client.
pub fn pg_stores(client: PgClient) -> Stores {
    Stores {
        users: Arc::new(PgUserStore { client: client.clone() }),
        tokens: Arc::new(PgTokenStore { client: client.clone() }),
        workouts: Arc::new(PgWorkoutStore { client }),
    }
}

fn map_pg(e: tokio_postgres::Error) -> StoreError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return StoreError::Conflict(e.to_string());
    }
    StoreError::Unavailable(e.to_string())
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        bio: row.get("bio"),
        password: crate::auth::Password::from_hash(row.get("password_hash")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub struct PgUserStore {
    client: PgClient,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &mut User) -> StoreResult<()> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                "INSERT INTO users (username, email, password_hash, bio) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, updated_at",
                &[&user.username, &user.email, &user.password.hash(), &user.bio],
            )
            .await
            .map_err(map_pg)?;
        user.id = row.get(0);
        user.created_at = row.get(1);
        user.updated_at = row.get(2);
        Ok(())
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<User> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT id, username, email, password_hash, bio, created_at, updated_at \
                 FROM users WHERE username = $1",
                &[&username],
            )
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;
        Ok(user_from_row(&row))
    }

    async fn search_by_username(&self, pattern: &str) -> StoreResult<Vec<User>> {
        let client = self.client.lock().await;
        let like = format!("%{pattern}%");
        let rows = client
            .query(
                "SELECT id, username, email, password_hash, bio, created_at, updated_at \
                 FROM users WHERE username ILIKE $1 ORDER BY id",
                &[&like],
            )
            .await
            .map_err(map_pg)?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn update(&self, user: &mut User) -> StoreResult<()> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "UPDATE users \
                 SET username = $1, email = $2, bio = $3, updated_at = now() \
                 WHERE id = $4 \
                 RETURNING updated_at",
                &[&user.username, &user.email, &user.bio, &user.id],
            )
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;
        user.updated_at = row.get(0);
        Ok(())
    }

    async fn get_by_token(&self, scope: &str, plaintext: &str) -> StoreResult<User> {
        let hash = digest(plaintext);
        let now = Utc::now();
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT u.id, u.username, u.email, u.password_hash, u.bio, \
                        u.created_at, u.updated_at \
                 FROM users u \
                 INNER JOIN tokens t ON t.user_id = u.id \
                 WHERE t.hash = $1 AND t.scope = $2 AND t.expiry > $3",
                &[&hash, &scope, &now],
            )
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;
        Ok(user_from_row(&row))
    }
}

pub struct PgTokenStore {
    client: PgClient,
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &Token) -> StoreResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)",
                &[&token.hash, &token.user_id, &token.expiry, &token.scope],
            )
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: &str) -> StoreResult<()> {
        let client = self.client.lock().await;
        client
            .execute(
                "DELETE FROM tokens WHERE scope = $1 AND user_id = $2",
                &[&scope, &user_id],
            )
            .await
            .map_err(map_pg)?;
        Ok(())
    }
}

pub struct PgWorkoutStore {
    client: PgClient,
}

const INSERT_ENTRY: &str = "INSERT INTO workout_entries \
     (workout_id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
     RETURNING id, created_at, updated_at";

#[async_trait]
impl WorkoutStore for PgWorkoutStore {
    async fn create(&self, workout: &mut Workout) -> StoreResult<()> {
        let mut client = self.client.lock().await;
        // Rolls back on drop unless committed.
        let tx = client.transaction().await.map_err(map_pg)?;

        let row = tx
            .query_one(
                "INSERT INTO workouts (user_id, title, description, duration_minutes, calories_burned) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, created_at, updated_at",
                &[
                    &workout.user_id,
                    &workout.title,
                    &workout.description,
                    &workout.duration_minutes,
                    &workout.calories_burned,
                ],
            )
            .await
            .map_err(map_pg)?;
        workout.id = row.get(0);
        workout.created_at = row.get(1);
        workout.updated_at = row.get(2);

        for entry in &mut workout.entries {
            entry.workout_id = workout.id;
            insert_entry(&tx, entry).await?;
        }

        tx.commit().await.map_err(map_pg)
    }

    async fn get(&self, id: i64) -> StoreResult<Workout> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT id, user_id, title, description, duration_minutes, calories_burned, \
                        created_at, updated_at \
                 FROM workouts WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;

        let mut workout = Workout {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            description: row.get("description"),
            duration_minutes: row.get("duration_minutes"),
            calories_burned: row.get("calories_burned"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            entries: Vec::new(),
        };

        let rows = client
            .query(
                "SELECT id, workout_id, exercise_name, sets, reps, duration_seconds, \
                        weight, notes, order_index, created_at, updated_at \
                 FROM workout_entries WHERE workout_id = $1 ORDER BY order_index",
                &[&workout.id],
            )
            .await
            .map_err(map_pg)?;
        for row in &rows {
            workout.entries.push(WorkoutEntry {
                id: row.get("id"),
                workout_id: row.get("workout_id"),
                exercise_name: row.get("exercise_name"),
                sets: row.get("sets"),
                reps: row.get("reps"),
                duration_seconds: row.get("duration_seconds"),
                weight: row.get("weight"),
                notes: row.get("notes"),
                order_index: row.get("order_index"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(workout)
    }

    async fn update(&self, workout: &mut Workout) -> StoreResult<()> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(map_pg)?;

        let row = tx
            .query_opt(
                "UPDATE workouts \
                 SET title = $1, description = $2, duration_minutes = $3, \
                     calories_burned = $4, updated_at = now() \
                 WHERE id = $5 \
                 RETURNING updated_at",
                &[
                    &workout.title,
                    &workout.description,
                    &workout.duration_minutes,
                    &workout.calories_burned,
                    &workout.id,
                ],
            )
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;
        workout.updated_at = row.get(0);

        // Entries are rewritten wholesale within the same transaction.
        tx.execute("DELETE FROM workout_entries WHERE workout_id = $1", &[&workout.id])
            .await
            .map_err(map_pg)?;
        for entry in &mut workout.entries {
            entry.workout_id = workout.id;
            insert_entry(&tx, entry).await?;
        }

        tx.commit().await.map_err(map_pg)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let client = self.client.lock().await;
        let affected = client
            .execute("DELETE FROM workouts WHERE id = $1", &[&id])
            .await
            .map_err(map_pg)?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn owner(&self, id: i64) -> StoreResult<i64> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT user_id FROM workouts WHERE id = $1", &[&id])
            .await
            .map_err(map_pg)?
            .ok_or(StoreError::NotFound)?;
        Ok(row.get(0))
    }
}

async fn insert_entry(
    tx: &tokio_postgres::Transaction<'_>,
    entry: &mut WorkoutEntry,
) -> StoreResult<()> {
    let row = tx
        .query_one(
            INSERT_ENTRY,
            &[
                &entry.workout_id,
                &entry.exercise_name,
                &entry.sets,
                &entry.reps,
                &entry.duration_seconds,
                &entry.weight,
                &entry.notes,
                &entry.order_index,
            ],
        )
        .await
        .map_err(map_pg)?;
    entry.id = row.get(0);
    entry.created_at = row.get(1);
    entry.updated_at = row.get(2);
    Ok(())
}
