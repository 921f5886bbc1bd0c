//! Authentication and authorization
//!
//! Login exchanges a credential payload for a session token and a
//! single-use nonce; the request guard enforces both plus a declared
//! permission on every protected route.

pub mod authorize;
pub mod credentials;
pub mod guard;
pub mod password;
pub mod service;

pub use authorize::is_authorized;
pub use credentials::Credentials;
pub use guard::{GuardedRequest, RequestGuard};
pub use password::{hash_password, verify_password, PasswordParams};
pub use service::{new_id, AuthService, ProtocolParams, TokenPair};
