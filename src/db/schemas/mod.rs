pub mod app;
pub mod message;
pub mod metadata;
pub mod nonce;
pub mod permission;
pub mod role;
pub mod user;
pub mod user_token;

pub use app::{AppDoc, APP_COLLECTION};
pub use message::{MessageDoc, Severity, MESSAGE_COLLECTION};
pub use metadata::Metadata;
pub use nonce::{NonceDoc, NONCE_COLLECTION};
pub use permission::{
    PermissionDoc, UserPermissionDoc, ALL_ACTIONS_PERMISSION, PERMISSION_COLLECTION,
    USER_PERMISSION_COLLECTION,
};
pub use role::{RoleDoc, DEFAULT_ROLE, ROLE_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
pub use user_token::{expiry_from_now, UserTokenDoc, USER_TOKEN_COLLECTION};
