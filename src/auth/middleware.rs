//! Authentication gate: runs once per request, before any handler.
//! No credential header resolves to the anonymous identity; a malformed
//! header is rejected before any store access; a well-formed bearer token is
//! resolved under the authentication scope. Unknown, wrong-scope, and
//! expired tokens are indistinguishable to the client.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::error::AppError;
use crate::server::AppState;
use crate::store::{StoreError, UserStore};

use super::identity::Identity;
use super::token::SCOPE_AUTH;

/// Extract the token value from an `Authorization` header that has exactly
/// the two-part form `Bearer <value>`. Anything else is malformed.
fn bearer_token(raw: &str) -> Option<&str> {
    let mut parts = raw.split(' ');
    let scheme = parts.next()?;
    let value = parts.next()?;
    if scheme != "Bearer" || parts.next().is_some() {
        return None;
    }
    Some(value)
}

pub async fn authenticate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut res = resolve_and_run(state, req, next).await;
    res.headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    res
}

async fn resolve_and_run(state: AppState, mut req: Request, next: Next) -> Response {
    let raw = match req.headers().get(header::AUTHORIZATION) {
        None => {
            req.extensions_mut().insert(Identity::Anonymous);
            return next.run(req).await;
        }
        Some(value) => value.to_str().ok().map(str::to_owned),
    };

    let Some(plaintext) = raw.as_deref().and_then(bearer_token) else {
        warn!("rejected malformed authorization header");
        return AppError::auth("invalid_authorization_header", "Invalid authorization header.")
            .into_response();
    };

    match state.stores.users.get_by_token(SCOPE_AUTH, plaintext).await {
        Ok(user) => {
            req.extensions_mut().insert(Identity::Authenticated(user));
            next.run(req).await
        }
        // Unknown, wrong scope, and expired all land here; no oracle.
        Err(StoreError::NotFound) => {
            warn!("bearer token did not resolve");
            AppError::auth("invalid_token", "Token expired, or invalid token.").into_response()
        }
        Err(e) => {
            error!("token resolution failed at the store: {e}");
            AppError::internal("auth_store_failure", "An unexpected error occurred.")
                .into_response()
        }
    }
}
