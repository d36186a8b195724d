//! SMS gateway HTTP client.

use crate::error::NotifyError;
use crate::types::{SendSmsRequest, SendSmsResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use validation::{DeliveryError, Notifier};

/// Client for an SMS gateway exposing `POST /v2/send`.
#[derive(Clone)]
pub struct SmsGatewayClient {
    client: Client,
    base_url: String,
    sender: String,
}

impl SmsGatewayClient {
    /// Create a new SMS gateway client sending from `sender`.
    pub fn new(
        base_url: impl Into<String>,
        sender: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sender: sender.into(),
        })
    }

    /// Check if the gateway is reachable.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Send a text message to one phone number.
    #[instrument(skip(self, message))]
    pub async fn send_sms(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let request = SendSmsRequest {
            message: message.to_string(),
            number: self.sender.clone(),
            recipients: vec![recipient.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/v2/send", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("SMS send failed: {}", msg);
            return Err(NotifyError::SendFailed(msg));
        }

        // Some gateways answer 201 with an empty body
        let body: SendSmsResponse = response.json().await.unwrap_or_default();
        debug!(timestamp = ?body.timestamp, "SMS accepted by gateway");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmsGatewayClient {
    async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError> {
        self.send_sms(target, message)
            .await
            .map_err(|e| DeliveryError::new(target, e.to_string()))
    }
}
