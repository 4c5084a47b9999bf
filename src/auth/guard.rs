//! Authorization gates over a resolved identity. Callers check resource
//! existence before ownership, so a missing resource reports not-found
//! rather than forbidden.

use crate::error::{AppError, AppResult};
use crate::models::User;

use super::identity::Identity;

/// Gate for any protected operation: anonymous identities are rejected with
/// an authentication failure.
pub fn require_authenticated(identity: &Identity) -> AppResult<&User> {
    match identity {
        Identity::Authenticated(user) => Ok(user),
        Identity::Anonymous => Err(AppError::auth(
            "unauthenticated",
            "You must be logged in to access this route.",
        )),
    }
}

/// Gate for operations on an owned resource. Call only after the resource is
/// known to exist.
pub fn require_owner(identity: &Identity, owner_id: i64) -> AppResult<()> {
    let user = require_authenticated(identity)?;
    if user.id != owner_id {
        return Err(AppError::forbidden(
            "not_owner",
            "You are not authorized to access this resource.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_id(id: i64) -> User {
        let mut user = User::new(format!("user{id}"), format!("u{id}@example.com"), String::new());
        user.id = id;
        user
    }

    #[test]
    fn anonymous_is_rejected() {
        let err = require_authenticated(&Identity::Anonymous).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn authenticated_passes() {
        let id = Identity::Authenticated(user_with_id(5));
        assert_eq!(require_authenticated(&id).unwrap().id, 5);
    }

    #[test]
    fn owner_check_passes_only_for_the_owner() {
        let id = Identity::Authenticated(user_with_id(3));
        assert!(require_owner(&id, 3).is_ok());
        let err = require_owner(&id, 9).unwrap_err();
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn owner_check_rejects_anonymous_as_unauthenticated() {
        let err = require_owner(&Identity::Anonymous, 1).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }
}
