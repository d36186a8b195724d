//! API request and response types.

use registration::{Reason, RegistrationStep};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
    /// Absent when SMS is only logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_gateway_healthy: Option<bool>,
}

/// Where the session stands in the flow.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub step: RegistrationStep,
}

/// Confirmation poll and confirmation form response.
#[derive(Debug, Serialize)]
pub struct ConfirmedResponse {
    pub confirmed: bool,
}

/// Response carrying the client's next location.
#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub redirecturl: String,
}

/// SMS code form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmsCodeRequest {
    pub smscode: String,
}

/// Request for a new SMS code, possibly to another number.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResendSmsRequest {
    pub phonenumber: String,
    pub langkey: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UsernameQuery {
    pub username: String,
}

/// Username availability.
#[derive(Debug, Serialize)]
pub struct UsernameResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Reason>,
}

/// Query of the link sent by SMS.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhoneLinkQuery {
    /// SMS code
    pub c: String,
    /// Validation key
    pub k: String,
}

/// Query of the link sent by email.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailLinkQuery {
    /// Validation key
    pub k: String,
}
