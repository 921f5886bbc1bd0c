//! Password hashing and verification using PBKDF2
//!
//! Derives a key with PBKDF2-HMAC-SHA256 over a per-user random salt.
//! Hash and salt are stored base64-encoded, side by side on the user
//! record, so verification re-derives with the stored salt and compares
//! in constant time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::types::{GatehouseError, Result};

/// PBKDF2 derivation parameters
#[derive(Debug, Clone, Copy)]
pub struct PasswordParams {
    pub iterations: u32,
    pub salt_size: usize,
    pub derived_key_len: usize,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            salt_size: 512,
            derived_key_len: 128,
        }
    }
}

/// Base64-encoded hash and salt pair, as stored on the user record
#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str, params: &PasswordParams) -> Result<HashedPassword> {
    let mut salt = vec![0u8; params.salt_size];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let hash = derive(password, &salt, params)?;

    Ok(HashedPassword {
        hash: BASE64.encode(hash),
        salt: BASE64.encode(salt),
    })
}

/// Verify a password against a stored base64 hash and salt
pub fn verify_password(
    password: &str,
    stored_hash: &str,
    stored_salt: &str,
    params: &PasswordParams,
) -> Result<bool> {
    let salt = BASE64
        .decode(stored_salt)
        .map_err(|e| GatehouseError::Internal(format!("Stored salt is not valid base64: {e}")))?;
    let expected = BASE64
        .decode(stored_hash)
        .map_err(|e| GatehouseError::Internal(format!("Stored hash is not valid base64: {e}")))?;

    let derived = derive(password, &salt, params)?;

    Ok(constant_time_compare(&derived, &expected))
}

fn derive(password: &str, salt: &[u8], params: &PasswordParams) -> Result<Vec<u8>> {
    let mut out = vec![0u8; params.derived_key_len];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, params.iterations, &mut out)
        .map_err(|e| GatehouseError::Internal(format!("Key derivation failed: {e}")))?;
    Ok(out)
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full-size parameters make each test derive take a while; these keep
    // the same code paths with a fast profile.
    fn test_params() -> PasswordParams {
        PasswordParams {
            iterations: 10,
            salt_size: 32,
            derived_key_len: 32,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let params = test_params();
        let hashed = hash_password("correct-horse-battery-staple", &params).unwrap();

        assert!(
            verify_password("correct-horse-battery-staple", &hashed.hash, &hashed.salt, &params)
                .unwrap()
        );
        assert!(!verify_password("wrong-password", &hashed.hash, &hashed.salt, &params).unwrap());
    }

    #[test]
    fn test_different_salts() {
        let params = test_params();
        let h1 = hash_password("same-password", &params).unwrap();
        let h2 = hash_password("same-password", &params).unwrap();

        // Same password, different salts, different hashes
        assert_ne!(h1.salt, h2.salt);
        assert_ne!(h1.hash, h2.hash);

        assert!(verify_password("same-password", &h1.hash, &h1.salt, &params).unwrap());
        assert!(verify_password("same-password", &h2.hash, &h2.salt, &params).unwrap());
    }

    #[test]
    fn test_invalid_stored_salt() {
        let params = test_params();
        let result = verify_password("password", "aGFzaA==", "not base64!!!", &params);
        assert!(result.is_err());
    }

    #[test]
    fn test_constant_time_compare_lengths() {
        assert!(!constant_time_compare(b"abc", b"abcd"));
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
    }
}
