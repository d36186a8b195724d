//! Registration session types.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named values kept in a registration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    Username,
    Email,
    Phonenumber,
    Password,
    PhonenumberValidationKey,
    EmailValidationKey,
    RedirectParams,
}

impl SessionField {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionField::Username => "username",
            SessionField::Email => "email",
            SessionField::Phonenumber => "phonenumber",
            SessionField::Password => "password",
            SessionField::PhonenumberValidationKey => "phonenumbervalidationkey",
            SessionField::EmailValidationKey => "emailvalidationkey",
            SessionField::RedirectParams => "redirectparams",
        }
    }
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side state of one in-progress registration.
///
/// A session returned with `is_new` set was never saved (or has expired);
/// it holds no values until the caller fills and saves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSession {
    /// Opaque identifier carried by the client cookie
    pub key: String,
    pub kind: String,
    pub name: String,
    pub values: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_new: bool,
}

impl RegistrationSession {
    /// Create an empty, unsaved session with a fresh key.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: generate_session_key(),
            kind: kind.into(),
            name: name.into(),
            values: HashMap::new(),
            created_at: Utc::now(),
            is_new: true,
        }
    }

    /// Value of `field`, or "" when unset.
    pub fn get(&self, field: SessionField) -> &str {
        self.values
            .get(field.as_str())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, field: SessionField, value: impl Into<String>) {
        self.values.insert(field.as_str().to_string(), value.into());
    }

    /// Remove every value. The session itself stays alive.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

fn generate_session_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
