//! Where a registration session stands in the flow.

use serde::Serialize;

/// Progress of one registration, derived from its session and the state of
/// its two validations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    /// No usable session; the client has to start over.
    NoSession,
    AwaitingPhoneConfirmation,
    AwaitingEmailConfirmation,
    /// Both channels confirmed, the final form has not been submitted.
    AwaitingSubmission,
    /// The draft was committed and handed over to login.
    Completed,
}

impl RegistrationStep {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStep::NoSession => "no_session",
            RegistrationStep::AwaitingPhoneConfirmation => "awaiting_phone_confirmation",
            RegistrationStep::AwaitingEmailConfirmation => "awaiting_email_confirmation",
            RegistrationStep::AwaitingSubmission => "awaiting_submission",
            RegistrationStep::Completed => "completed",
        }
    }
}
