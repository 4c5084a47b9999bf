//! Authentication and authorization core: password credentials, opaque
//! bearer tokens, request identity, and ownership gates.
//! Keep the public surface thin and split implementation across sub-modules.

mod guard;
mod identity;
mod middleware;
mod password;
mod token;

pub use guard::{require_authenticated, require_owner};
pub use identity::Identity;
pub use middleware::authenticate;
pub use password::Password;
pub use token::{digest, issue_token, Token, SCOPE_AUTH};
