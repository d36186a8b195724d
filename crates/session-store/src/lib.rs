//! Server-side registration sessions.
//!
//! A session correlates a client cookie with the draft values of one
//! in-progress registration. Sessions live in memory and expire a fixed
//! time after creation.

mod error;
mod store;
mod types;

pub use error::SessionError;
pub use store::{MemorySessionStore, SessionStore};
pub use types::*;

use serde::Deserialize;
use std::time::Duration;

/// Session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a registration session
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// Name of the cookie carrying the session key
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_cookie_name() -> String {
    "registration".to_string()
}
