//! Request-scoped identity: either the anonymous sentinel or a resolved
//! authenticated user. The value is attached once per request by the
//! authentication middleware and threaded explicitly from there; there is no
//! global accessor.

use crate::models::User;

#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_carries_no_user() {
        let id = Identity::Anonymous;
        assert!(id.is_anonymous());
        assert!(id.user().is_none());
        assert_eq!(id.user_id(), None);
    }

    #[test]
    fn authenticated_exposes_the_user() {
        let mut user = User::new("grace".into(), "grace@example.com".into(), String::new());
        user.id = 3;
        let id = Identity::Authenticated(user);
        assert!(!id.is_anonymous());
        assert_eq!(id.user_id(), Some(3));
        assert_eq!(id.user().unwrap().username, "grace");
    }
}
