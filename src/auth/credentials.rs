//! Credential header parsing
//!
//! Login requests carry a `Credentials` header: base64 over three
//! newline-separated segments.
//!
//! ```text
//! appid:<app id>
//! username:<username>
//! password:<password>
//! ```
//!
//! Passwords may contain colons; only the first colon per line separates
//! the key from the value.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::types::{GatehouseError, Result};

/// Parsed login credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Decode and parse a `Credentials` header value.
    ///
    /// The payload must hold exactly three segments in this order; segments
    /// out of order, duplicated, or blank are rejected. One trailing
    /// newline is tolerated.
    pub fn parse(header_value: &str) -> Result<Self> {
        let decoded = BASE64.decode(header_value.trim()).map_err(|_| {
            GatehouseError::MalformedCredentials("credentials are not valid base64".into())
        })?;

        let text = String::from_utf8(decoded).map_err(|_| {
            GatehouseError::MalformedCredentials("credentials are not valid UTF-8".into())
        })?;

        let mut text = text.as_str();
        if let Some(stripped) = text.strip_suffix('\n') {
            text = stripped;
        }

        // Tolerate CRLF payloads from Windows clients
        let segments: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        if segments.len() != 3 {
            return Err(GatehouseError::MalformedCredentials(format!(
                "expected 3 credential segments, got {}",
                segments.len()
            )));
        }

        Ok(Self {
            app_id: expect_segment(segments[0], "appid")?,
            username: expect_segment(segments[1], "username")?,
            password: expect_segment(segments[2], "password")?,
        })
    }

    /// Encode credentials into a header value. Used by clients and tests.
    pub fn encode(app_id: &str, username: &str, password: &str) -> String {
        BASE64.encode(format!(
            "appid:{app_id}\nusername:{username}\npassword:{password}"
        ))
    }
}

/// Take the value of a segment that must start with `key:`
fn expect_segment(line: &str, key: &str) -> Result<String> {
    line.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(|value| value.to_string())
        .ok_or_else(|| {
            GatehouseError::MalformedCredentials(format!("segment does not start with '{key}:'"))
        })
}
