//! Registration with two-channel ownership proof.
//!
//! A candidate registers by proving control of a phone number (numeric SMS
//! code) and an email address (emailed link). The [`RegistrationOrchestrator`]
//! keeps the registration session, the two validation requests and the
//! draft user consistent across refreshes, resends and changed details.

mod error;
pub mod identity;
pub mod memory;
pub mod names;
mod orchestrator;
mod step;

pub use error::{ErrorKind, Reason, RegistrationError};
pub use identity::{
    CredentialError, CredentialStore, DraftUser, LoginHandoff, OrganizationStore, StoreError,
    UserStore,
};
pub use orchestrator::{
    Collaborators, RegistrationForm, RegistrationOrchestrator, ResendRequest,
    ValidateInfoRequest, SESSION_KIND, SESSION_NAME,
};
pub use step::RegistrationStep;

use serde::Deserialize;
use std::time::Duration;

/// Registration flow settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Drafts allowed to await phone confirmation at once
    #[serde(default = "default_max_pending_registrations")]
    pub max_pending_registrations: usize,

    /// Time a draft user has to confirm its phone number
    #[serde(default = "default_draft_grace", with = "humantime_serde")]
    pub draft_grace: Duration,

    /// Externally visible base URL, used in confirmation links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_pending_registrations: default_max_pending_registrations(),
            draft_grace: default_draft_grace(),
            public_url: default_public_url(),
        }
    }
}

fn default_max_pending_registrations() -> usize {
    10_000
}

fn default_draft_grace() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_public_url() -> String {
    "https://localhost:8443".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RegistrationConfig::default();
        assert_eq!(config.max_pending_registrations, 10_000);
        assert_eq!(config.draft_grace, Duration::from_secs(86_400));
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{"draft_grace": "12h", "public_url": "https://id.example"}"#;
        let config: RegistrationConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.draft_grace, Duration::from_secs(12 * 3600));
        assert_eq!(config.public_url, "https://id.example");
        assert_eq!(config.max_pending_registrations, 10_000);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RegistrationError::Rejected(Reason::InvalidSmsCode).kind(),
            ErrorKind::UnprocessableEntity(Reason::InvalidSmsCode)
        );
        assert_eq!(RegistrationError::SessionExpired.kind(), ErrorKind::Unauthorized);
        assert_eq!(RegistrationError::CapacityReached.kind(), ErrorKind::InternalError);
        assert_eq!(
            RegistrationError::from(CredentialError::Policy("short".into())).kind(),
            ErrorKind::UnprocessableEntity(Reason::InvalidPassword)
        );
        assert_eq!(
            RegistrationError::from(CredentialError::Internal("db down".into())).kind(),
            ErrorKind::InternalError
        );
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&Reason::PhoneAlreadyUsed).unwrap();
        assert_eq!(json, "\"phone_already_used\"");
        assert_eq!(Reason::InvalidSmsCode.to_string(), "invalid_sms_code");
    }

    #[test]
    fn test_step_serialization() {
        let json = serde_json::to_string(&RegistrationStep::AwaitingEmailConfirmation).unwrap();
        assert_eq!(json, "\"awaiting_email_confirmation\"");
    }
}
