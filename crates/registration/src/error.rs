//! Registration errors and their client-facing classification.

use serde::Serialize;
use session_store::SessionError;
use std::fmt;
use thiserror::Error;
use validation::ValidationError;

use crate::identity::{CredentialError, StoreError};

/// Machine-readable reason attached to a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    InvalidSmsCode,
    InvalidUsernameFormat,
    UserExists,
    OrganizationExists,
    InvalidFirstName,
    InvalidLastName,
    InvalidEmailFormat,
    EmailAlreadyUsed,
    InvalidPhonenumber,
    PhoneAlreadyUsed,
    InvalidPassword,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::InvalidSmsCode => "invalid_sms_code",
            Reason::InvalidUsernameFormat => "invalid_username_format",
            Reason::UserExists => "user_exists",
            Reason::OrganizationExists => "organization_exists",
            Reason::InvalidFirstName => "invalid_first_name",
            Reason::InvalidLastName => "invalid_last_name",
            Reason::InvalidEmailFormat => "invalid_email_format",
            Reason::EmailAlreadyUsed => "email_already_used",
            Reason::InvalidPhonenumber => "invalid_phonenumber",
            Reason::PhoneAlreadyUsed => "phone_already_used",
            Reason::InvalidPassword => "invalid_password",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed operation should be reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    /// The registration session is missing or expired; start over.
    Unauthorized,
    UnprocessableEntity(Reason),
    InternalError,
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Bad request: {0}")]
    BadRequest(&'static str),

    #[error("Registration session missing or expired")]
    SessionExpired,

    #[error("Rejected: {0}")]
    Rejected(Reason),

    #[error("Maximum number of pending registrations reached")]
    CapacityReached,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::BadRequest(_) => ErrorKind::BadRequest,
            RegistrationError::SessionExpired => ErrorKind::Unauthorized,
            RegistrationError::Rejected(reason) => ErrorKind::UnprocessableEntity(*reason),
            RegistrationError::CapacityReached
            | RegistrationError::Validation(_)
            | RegistrationError::Session(_)
            | RegistrationError::Store(_)
            | RegistrationError::Credential(_) => ErrorKind::InternalError,
        }
    }

    /// Whether this is an expected outcome rather than a fault.
    pub fn is_expected(&self) -> bool {
        !matches!(self.kind(), ErrorKind::InternalError)
    }
}

impl From<Reason> for RegistrationError {
    fn from(reason: Reason) -> Self {
        RegistrationError::Rejected(reason)
    }
}

impl From<CredentialError> for RegistrationError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Policy(_) => RegistrationError::Rejected(Reason::InvalidPassword),
            CredentialError::Internal(msg) => RegistrationError::Credential(msg),
        }
    }
}
