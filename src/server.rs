//!
//! fitlog HTTP server
//! ------------------
//! This module defines the Axum-based HTTP API for fitlog.
//!
//! Responsibilities:
//! - User registration and login (token issuance) endpoints.
//! - The authentication gate mounted ahead of every route, so handlers
//!   always see a resolved identity.
//! - Workout CRUD endpoints enforcing authentication and ownership.
//! - JSON envelope responses: "success" / "fail" / "error".

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::Duration;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::auth::{self, Identity, SCOPE_AUTH};
use crate::error::{AppError, AppResult};
use crate::models::{User, Workout, WorkoutEntry};
use crate::store::{postgres, StoreError, Stores, UserStore, WorkoutStore};

/// Login tokens live this long, in hours.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Shared server state injected into all handlers: the storage capability
/// bundle, nothing else. Identity is per-request and travels in extensions.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
}

/// Start the fitlog HTTP server against the Postgres backend configured by
/// `FITLOG_DATABASE_URL`, listening on `http_port`.
pub async fn run_with_ports(http_port: u16, dsn: &str) -> anyhow::Result<()> {
    let client = postgres::connect(dsn).await?;
    let stores = postgres::pg_stores(client);
    run_with_stores(http_port, stores).await
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    let http_port: u16 = std::env::var("FITLOG_HTTP_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;
    let dsn = std::env::var("FITLOG_DATABASE_URL").unwrap_or_else(|_| {
        "host=localhost dbname=postgres password=postgres user=postgres port=5432".to_string()
    });
    run_with_ports(http_port, &dsn).await
}

pub async fn run_with_stores(http_port: u16, stores: Stores) -> anyhow::Result<()> {
    let app = router(AppState { stores });
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mount all routes behind the authentication gate. The gate runs before any
/// handler, so reading identity inside a handler is always well-defined.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "fitlog ok" }))
        .route("/users", post(register_user))
        .route("/tokens/authentication", post(create_token))
        .route("/workouts", post(create_workout))
        .route(
            "/workouts/{id}",
            get(get_workout).put(update_workout).delete(delete_workout),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .with_state(state)
}

fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        AppError::validation(
            "invalid_id",
            "Invalid workout ID. Please provide a valid numeric identifier.",
        )
    })
}

// ---- users ----

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    bio: String,
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

fn validate_registration(payload: &RegisterPayload) -> AppResult<()> {
    let invalid = |reason: &str| {
        warn!("invalid user registration request: {reason}");
        AppError::validation(
            "invalid_registration",
            "Invalid request payload. Please ensure all fields are correctly provided.",
        )
    };
    if payload.username.len() < 5 {
        return Err(invalid("username must contain at least 5 characters"));
    }
    if payload.username.len() > 50 {
        return Err(invalid("username can't be greater than 50 characters"));
    }
    if !EMAIL_RE.is_match(&payload.email) {
        return Err(invalid("invalid email format"));
    }
    if payload.password.len() < 10 {
        return Err(invalid("password must contain at least 10 characters"));
    }
    Ok(())
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<impl IntoResponse> {
    validate_registration(&payload)?;

    let mut user = User::new(payload.username, payload.email, payload.bio);
    user.password.set(&payload.password)?;

    state.stores.users.create(&mut user).await.map_err(|e| match e {
        StoreError::Conflict(_) => {
            warn!("registration rejected, username taken: {}", user.username);
            AppError::conflict("username_taken", "That username is already registered.")
        }
        other => {
            error!("failed to execute user registration in store: {other}");
            AppError::internal(
                "registration_failed",
                "Failed to register the user due to a server error. Please try again later.",
            )
        }
    })?;

    info!(user_id = user.id, "user created successfully");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "user": user } })),
    ))
}

// ---- tokens ----

#[derive(Debug, Deserialize)]
struct CreateTokenPayload {
    username: String,
    password: String,
}

fn invalid_credentials() -> AppError {
    AppError::auth(
        "invalid_credentials",
        "Invalid username or password. Please try again.",
    )
}

async fn create_token(
    State(state): State<AppState>,
    Json(payload): Json<CreateTokenPayload>,
) -> AppResult<impl IntoResponse> {
    let user = match state.stores.users.get_by_username(&payload.username).await {
        Ok(user) => user,
        // Unknown user and wrong password are the same failure to the
        // client: no username-existence oracle.
        Err(StoreError::NotFound) => {
            warn!("login attempt for unknown username");
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!("failed to fetch user by username: {e}");
            return Err(e.into());
        }
    };

    let matched = match user.password.matches(&payload.password) {
        Ok(matched) => matched,
        Err(e) => {
            // Denied externally either way; the log distinguishes the cases.
            error!("error comparing password hash: {e}");
            return Err(invalid_credentials());
        }
    };
    if !matched {
        warn!("invalid credentials provided");
        return Err(invalid_credentials());
    }

    let token = auth::issue_token(
        state.stores.tokens.as_ref(),
        user.id,
        Duration::hours(TOKEN_TTL_HOURS),
        SCOPE_AUTH,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "auth_token": token } })),
    ))
}

// ---- workouts ----

#[derive(Debug, Deserialize)]
struct CreateWorkoutPayload {
    title: String,
    #[serde(default)]
    description: String,
    duration_minutes: i32,
    calories_burned: i32,
    #[serde(default)]
    entries: Vec<WorkoutEntry>,
}

async fn create_workout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateWorkoutPayload>,
) -> AppResult<impl IntoResponse> {
    let user = auth::require_authenticated(&identity)?;

    let mut workout = Workout {
        id: 0,
        user_id: user.id,
        title: payload.title,
        description: payload.description,
        duration_minutes: payload.duration_minutes,
        calories_burned: payload.calories_burned,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        entries: payload.entries,
    };

    state.stores.workouts.create(&mut workout).await.map_err(|e| {
        error!("failed to execute workout creation in store: {e}");
        AppError::internal(
            "workout_create_failed",
            "Failed to create the workout due to a server error. Please try again later.",
        )
    })?;

    info!(workout_id = workout.id, "workout created successfully");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "workout": workout } })),
    ))
}

async fn get_workout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let workout_id = parse_id(&id)?;
    let workout = state.stores.workouts.get(workout_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            warn!(workout_id, "workout not found for given id");
            AppError::not_found("workout_not_found", "The requested workout could not be found.")
        }
        other => {
            error!(workout_id, "failed to fetch workout by id: {other}");
            other.into()
        }
    })?;
    Ok(Json(json!({ "status": "success", "data": { "workout": workout } })))
}

#[derive(Debug, Deserialize)]
struct UpdateWorkoutPayload {
    title: Option<String>,
    description: Option<String>,
    duration_minutes: Option<i32>,
    calories_burned: Option<i32>,
    entries: Option<Vec<WorkoutEntry>>,
}

async fn update_workout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateWorkoutPayload>,
) -> AppResult<impl IntoResponse> {
    let workout_id = parse_id(&id)?;
    let user = auth::require_authenticated(&identity)?;

    // Existence before ownership: a missing workout is not-found even when
    // the caller would not have owned it.
    let mut workout = state.stores.workouts.get(workout_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            warn!(workout_id, "attempted to update a workout that does not exist");
            AppError::not_found(
                "workout_not_found",
                "The workout you are trying to update could not be found.",
            )
        }
        other => {
            error!(workout_id, "failed to fetch workout for update: {other}");
            other.into()
        }
    })?;

    if workout.user_id != user.id {
        warn!(workout_id, user_id = user.id, "unauthorized attempt to update a workout");
    }
    auth::require_owner(&identity, workout.user_id)?;

    if let Some(title) = payload.title {
        workout.title = title;
    }
    if let Some(description) = payload.description {
        workout.description = description;
    }
    if let Some(duration_minutes) = payload.duration_minutes {
        workout.duration_minutes = duration_minutes;
    }
    if let Some(calories_burned) = payload.calories_burned {
        workout.calories_burned = calories_burned;
    }
    if let Some(entries) = payload.entries {
        workout.entries = entries;
    }

    state.stores.workouts.update(&mut workout).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found(
            "workout_not_found",
            "The workout you are trying to update could not be found.",
        ),
        other => {
            error!(workout_id, "failed to execute workout update in store: {other}");
            AppError::internal(
                "workout_update_failed",
                "Failed to update the workout due to a server error. Please try again later.",
            )
        }
    })?;

    info!(workout_id, "workout updated successfully");
    Ok(Json(json!({ "status": "success", "data": { "workout": workout } })))
}

async fn delete_workout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let workout_id = parse_id(&id)?;
    let user = auth::require_authenticated(&identity)?;

    let owner = state.stores.workouts.owner(workout_id).await.map_err(|e| match e {
        StoreError::NotFound => {
            warn!(workout_id, "attempted to delete a workout that does not exist");
            AppError::not_found(
                "workout_not_found",
                "The workout you are trying to delete could not be found.",
            )
        }
        other => {
            error!(workout_id, "failed to fetch workout owner for delete: {other}");
            other.into()
        }
    })?;

    if owner != user.id {
        warn!(workout_id, user_id = user.id, "unauthorized attempt to delete a workout");
    }
    auth::require_owner(&identity, owner)?;

    state.stores.workouts.delete(workout_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found(
            "workout_not_found",
            "The workout you are trying to delete could not be found.",
        ),
        other => {
            error!(workout_id, "failed to execute workout deletion in store: {other}");
            AppError::internal(
                "workout_delete_failed",
                "Failed to delete the workout due to a server error. Please try again later.",
            )
        }
    })?;

    info!(workout_id, "workout deleted successfully");
    Ok(StatusCode::NO_CONTENT)
}
