//! Gatehouse - token + nonce authentication core
//!
//! Login exchanges a structured credential payload for a reusable session
//! token plus a single-use nonce. Every protected call presents both; the
//! guard validates them, checks a declared permission, runs the operation,
//! then consumes the nonce, issues a fresh one, and extends the token.
//!
//! ## Components
//!
//! - **auth**: credential parsing, PBKDF2 hashing, login, guard protocol
//! - **db**: MongoDB store (with soft deletes) and an in-memory twin
//! - **routes**: login/register plus a guarded entity surface
//! - **logging**: durable audit log for unexpected failures

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatehouseError, Result};
