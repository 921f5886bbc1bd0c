//! Configuration for Gatehouse
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Gatehouse - token + nonce authentication core for the Core API
#[derive(Parser, Debug, Clone)]
#[command(name = "gatehouse")]
#[command(about = "Authentication and authorization service for the Core API")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store when MongoDB is unavailable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "gatehouse")]
    pub mongodb_db: String,

    /// Session token lifetime; extended by the same amount on every
    /// successful guarded call
    #[arg(long, env = "TOKEN_TTL_MINUTES", default_value = "10")]
    pub token_ttl_minutes: i64,

    /// Nonce lifetime
    #[arg(long, env = "NONCE_TTL_MINUTES", default_value = "10")]
    pub nonce_ttl_minutes: i64,

    /// PBKDF2 iteration count for password hashing
    #[arg(long, env = "PBKDF2_ITERATIONS", default_value = "10000")]
    pub pbkdf2_iterations: u32,

    /// Password salt size in bytes
    #[arg(long, env = "SALT_SIZE", default_value = "512")]
    pub salt_size: usize,

    /// Derived key length in bytes for password hashes
    #[arg(long, env = "DERIVED_KEY_LEN", default_value = "128")]
    pub derived_key_len: usize,

    /// Random value size in bytes for tokens and nonces
    #[arg(long, env = "TOKEN_SIZE", default_value = "64")]
    pub token_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token_ttl_minutes <= 0 || self.nonce_ttl_minutes <= 0 {
            return Err("TOKEN_TTL_MINUTES and NONCE_TTL_MINUTES must be positive".to_string());
        }

        if self.pbkdf2_iterations < 1000 {
            return Err("PBKDF2_ITERATIONS must be at least 1000".to_string());
        }

        if self.salt_size < 16 || self.derived_key_len < 16 {
            return Err("SALT_SIZE and DERIVED_KEY_LEN must be at least 16 bytes".to_string());
        }

        if self.token_size < 32 {
            return Err("TOKEN_SIZE must be at least 32 bytes".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args::parse_from(["gatehouse"])
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = default_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.token_ttl_minutes, 10);
        assert_eq!(args.token_size, 64);
        assert_eq!(args.pbkdf2_iterations, 10_000);
    }

    #[test]
    fn test_rejects_tiny_token() {
        let mut args = default_args();
        args.token_size = 8;
        assert!(args.validate().is_err());
    }
}
