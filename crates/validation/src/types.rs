//! Validation record types.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of random bytes behind a validation key.
const KEY_BYTES: usize = 32;

/// Outcome of looking up a validation request by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// The request exists and has not been confirmed yet.
    Pending,
    /// The request exists and was confirmed.
    Confirmed,
    /// No live request exists for the key (empty, unknown, expired or removed).
    NoSuchRequest,
}

impl ValidationStatus {
    pub fn is_confirmed(self) -> bool {
        self == ValidationStatus::Confirmed
    }
}

/// Behavior shared by the phone and email request records.
pub trait PendingValidation: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;

    fn expires_at(&self) -> DateTime<Utc>;

    fn is_confirmed(&self) -> bool;

    /// Flip `confirmed` to true. Never flips back.
    fn mark_confirmed(&mut self);

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

/// Pending or confirmed phone number validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneValidationRequest {
    pub key: String,
    pub username: String,
    pub phonenumber: String,
    pub sms_code: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PhoneValidationRequest {
    /// Create a new unconfirmed request with a fresh key and code.
    pub fn new(username: &str, phonenumber: &str, code_length: usize, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            key: generate_key(),
            username: username.to_string(),
            phonenumber: phonenumber.to_string(),
            sms_code: generate_sms_code(code_length),
            confirmed: false,
            created_at,
            expires_at: expiry_from(created_at, ttl),
        }
    }
}

impl PendingValidation for PhoneValidationRequest {
    fn key(&self) -> &str {
        &self.key
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    fn mark_confirmed(&mut self) {
        self.confirmed = true;
    }
}

/// Pending or confirmed email address validation.
///
/// There is no code: the key itself travels in the emailed link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailValidationRequest {
    pub key: String,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl EmailValidationRequest {
    pub fn new(username: &str, email: &str, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            key: generate_key(),
            username: username.to_string(),
            email: email.to_string(),
            confirmed: false,
            created_at,
            expires_at: expiry_from(created_at, ttl),
        }
    }
}

impl PendingValidation for EmailValidationRequest {
    fn key(&self) -> &str {
        &self.key
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    fn mark_confirmed(&mut self) {
        self.confirmed = true;
    }
}

/// A phone number or email address that a user has proven control of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatedTarget {
    pub username: String,
    pub target: String,
    pub validated_at: DateTime<Utc>,
}

impl ValidatedTarget {
    pub fn new(username: &str, target: &str) -> Self {
        Self {
            username: username.to_string(),
            target: target.to_string(),
            validated_at: Utc::now(),
        }
    }
}

/// Generate an opaque, URL-safe validation key.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a numeric SMS code of the given length.
pub fn generate_sms_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length.max(1))
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn expiry_from(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(10));
    created_at + ttl
}
