//! Ownership validation for phone numbers and email addresses.
//!
//! A validation request is a short-lived record identified by an opaque key.
//! Phone requests carry a numeric code delivered by SMS; email requests are
//! confirmed by opening a link that carries the key. Notifications go out
//! through a background [`Dispatcher`] so callers never wait on a gateway.

mod dispatch;
mod email;
mod error;
pub mod messages;
mod phone;
mod store;
mod types;

pub use dispatch::{DispatchConfig, DispatchHandle, Dispatcher, Notification, Notifier};
pub use email::EmailValidationService;
pub use error::{DeliveryError, ValidationError};
pub use phone::PhoneValidationService;
pub use store::{MemoryRecordStore, MemoryValidatedTargets, RecordStore, ValidatedTargetStore};
pub use types::*;

use serde::Deserialize;
use std::time::Duration;

/// Validation request settings shared by both channels.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Lifetime of a validation request
    #[serde(default = "default_record_ttl", with = "humantime_serde")]
    pub record_ttl: Duration,

    /// Number of digits in an SMS code
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            record_ttl: default_record_ttl(),
            code_length: default_code_length(),
        }
    }
}

fn default_record_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_code_length() -> usize {
    6
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Notifier that keeps every delivered message.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        /// Wait until at least `count` messages went out, then return them.
        pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
            for _ in 0..200 {
                {
                    let sent = self.sent.lock().await;
                    if sent.len() >= count {
                        return sent.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {} notifications", count);
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .await
                .push(Notification::new(target, message));
            Ok(())
        }
    }

    pub fn phone_service() -> (
        PhoneValidationService,
        Arc<MemoryRecordStore<PhoneValidationRequest>>,
        Arc<MemoryValidatedTargets>,
        Arc<RecordingNotifier>,
    ) {
        let records = Arc::new(MemoryRecordStore::new());
        let validated = Arc::new(MemoryValidatedTargets::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatch, _task) = Dispatcher::spawn(notifier.clone(), DispatchConfig::default());
        let service = PhoneValidationService::new(
            records.clone(),
            validated.clone(),
            dispatch,
            ValidationConfig::default(),
        );
        (service, records, validated, notifier)
    }

    pub fn email_service() -> (
        EmailValidationService,
        Arc<MemoryRecordStore<EmailValidationRequest>>,
        Arc<MemoryValidatedTargets>,
        Arc<RecordingNotifier>,
    ) {
        let records = Arc::new(MemoryRecordStore::new());
        let validated = Arc::new(MemoryValidatedTargets::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatch, _task) = Dispatcher::spawn(notifier.clone(), DispatchConfig::default());
        let service = EmailValidationService::new(
            records.clone(),
            validated.clone(),
            dispatch,
            ValidationConfig::default(),
        );
        (service, records, validated, notifier)
    }
}
