//! Transport that only logs, for local development.

use async_trait::async_trait;
use tracing::{debug, info};
use validation::{DeliveryError, Notifier};

/// Writes every notification to the log instead of delivering it.
///
/// Message bodies carry codes and validation keys, so they only appear at
/// `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl Notifier for LogTransport {
    async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError> {
        info!(recipient = %target, len = message.len(), "Notification not delivered (log transport)");
        debug!(recipient = %target, "Notification body: {}", message);
        Ok(())
    }
}
