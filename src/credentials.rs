//! Authentication credentials for a ClickHouse server.

use serde::{Deserialize, Serialize};

/// Username/password pair sent with every query.
///
/// The HTTP interface authenticates per request; there is no session
/// handshake to keep alive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// Username for authentication
    pub username: String,

    /// Password for authentication (may be empty)
    pub password: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    /// The server's out-of-the-box account: `default` with no password.
    fn default() -> Self {
        Self {
            username: "default".to_string(),
            password: String::new(),
        }
    }
}
