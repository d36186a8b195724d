//! Collaborators owning users, organizations, credentials and login.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_store::RegistrationSession;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum CredentialError {
    /// The password does not satisfy the password policy.
    #[error("Password rejected: {0}")]
    Policy(String),

    #[error("Credential store error: {0}")]
    Internal(String),
}

/// A user record created during registration.
///
/// Carries an expiry until its phone number is confirmed; unconfirmed drafts
/// are purged by the user store once it passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phonenumber: String,
    pub expire: Option<DateTime<Utc>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists(&self, username: &str) -> Result<bool, StoreError>;

    async fn get_by_name(&self, username: &str) -> Result<Option<DraftUser>, StoreError>;

    /// Insert or replace the user keyed by its username.
    async fn save(&self, user: DraftUser) -> Result<(), StoreError>;

    async fn save_phone(&self, username: &str, phonenumber: &str) -> Result<(), StoreError>;

    /// Clear the expiry so the user is no longer a pending registration.
    async fn remove_expire_date(&self, username: &str) -> Result<(), StoreError>;

    /// Number of users that still carry an expiry.
    async fn count_pending_registrations(&self) -> Result<usize, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn exists(&self, globalid: &str) -> Result<bool, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save(&self, username: &str, password: &str) -> Result<(), CredentialError>;
}

/// Hands a freshly registered user over to the login flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginHandoff: Send + Sync {
    /// Log `username` in and return where the client should go next.
    ///
    /// `session` has been cleared down to its redirect parameters.
    async fn login(
        &self,
        session: &RegistrationSession,
        username: &str,
    ) -> Result<String, StoreError>;
}
