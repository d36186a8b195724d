//! Validation errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    /// The key is empty, unknown, expired or was removed.
    #[error("Invalid or expired validation key")]
    InvalidOrExpiredKey,

    #[error("Invalid validation code")]
    InvalidCode,

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure reported by a notification transport.
#[derive(Error, Debug)]
#[error("Delivery to {target} failed: {reason}")]
pub struct DeliveryError {
    pub target: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}
