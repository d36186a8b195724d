//! Wire types for the notification gateways.

use serde::{Deserialize, Serialize};

/// SMS gateway send request.
#[derive(Debug, Clone, Serialize)]
pub struct SendSmsRequest {
    pub message: String,
    pub number: String,
    pub recipients: Vec<String>,
}

/// SMS gateway send response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendSmsResponse {
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Mail address with optional display name.
#[derive(Debug, Clone, Serialize)]
pub struct MailAddress {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Transactional mail API request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    pub sender: MailAddress,
    pub to: Vec<MailAddress>,
    pub subject: String,
    pub text_content: String,
}

/// Transactional mail API response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailResponse {
    #[serde(default)]
    pub message_id: Option<String>,
}
