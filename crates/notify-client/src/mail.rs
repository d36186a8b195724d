//! Transactional mail API client.

use crate::error::NotifyError;
use crate::types::{MailAddress, SendMailRequest, SendMailResponse};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use validation::{DeliveryError, Notifier};

/// Client for a mail API exposing `POST /v3/smtp/email`.
#[derive(Clone)]
pub struct MailClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    sender: MailAddress,
    subject: String,
}

impl MailClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        sender_email: impl Into<String>,
        sender_name: Option<String>,
        subject: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            sender: MailAddress {
                email: sender_email.into(),
                name: sender_name,
            },
            subject: subject.into(),
        })
    }

    /// Send a plain-text mail to one address.
    #[instrument(skip(self, text))]
    pub async fn send_mail(&self, to: &str, text: &str) -> Result<(), NotifyError> {
        let request = SendMailRequest {
            sender: self.sender.clone(),
            to: vec![MailAddress {
                email: to.to_string(),
                name: None,
            }],
            subject: self.subject.clone(),
            text_content: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v3/smtp/email", self.base_url))
            .header("api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::Api("mail API rejected the API key".into()));
        }
        if !status.is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Mail send failed ({}): {}", status, msg);
            return Err(NotifyError::SendFailed(msg));
        }

        let body: SendMailResponse = response.json().await.unwrap_or_default();
        debug!(message_id = ?body.message_id, "Mail accepted by API");
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailClient {
    async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError> {
        self.send_mail(target, message)
            .await
            .map_err(|e| DeliveryError::new(target, e.to_string()))
    }
}
