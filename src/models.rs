//! Domain records shared across the service: users and workouts.
//! The auth core treats `User` as an opaque identity carrier plus its
//! credential hash; workout records exist so ownership checks have something
//! to protect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Password;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    /// Credential hash. Never serialized.
    #[serde(skip)]
    pub password: Password,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh, unpersisted user record; the store assigns id and timestamps.
    pub fn new(username: String, email: String, bio: String) -> Self {
        let now = Utc::now();
        User {
            id: 0,
            username,
            email,
            bio,
            password: Password::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<WorkoutEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub workout_id: i64,
    pub exercise_name: String,
    pub sets: i32,
    #[serde(default)]
    pub reps: Option<i32>,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: String,
    pub order_index: i32,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}
