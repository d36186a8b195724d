//! Email address validation by emailed link.

use crate::dispatch::{DispatchHandle, Notification};
use crate::error::ValidationError;
use crate::messages;
use crate::store::{RecordStore, ValidatedTargetStore};
use crate::types::{EmailValidationRequest, ValidatedTarget, ValidationStatus};
use crate::ValidationConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Issues and checks email address validations.
#[derive(Clone)]
pub struct EmailValidationService {
    records: Arc<dyn RecordStore<EmailValidationRequest>>,
    validated: Arc<dyn ValidatedTargetStore>,
    dispatch: DispatchHandle,
    config: ValidationConfig,
}

impl EmailValidationService {
    pub fn new(
        records: Arc<dyn RecordStore<EmailValidationRequest>>,
        validated: Arc<dyn ValidatedTargetStore>,
        dispatch: DispatchHandle,
        config: ValidationConfig,
    ) -> Self {
        Self {
            records,
            validated,
            dispatch,
            config,
        }
    }

    /// Create a validation request for `email` and queue the message.
    #[instrument(skip(self, confirmation_url))]
    pub async fn request_validation(
        &self,
        username: &str,
        email: &str,
        confirmation_url: &str,
        locale: &str,
    ) -> Result<String, ValidationError> {
        let request = EmailValidationRequest::new(username, email, self.config.record_ttl);
        let key = request.key.clone();
        let link = messages::email_confirmation_link(confirmation_url, &key, locale);
        let text = messages::email_confirmation(locale, &link);

        self.records.insert(request).await?;
        self.dispatch.enqueue(Notification::new(email, text));

        info!("Email validation requested");
        Ok(key)
    }

    pub async fn status(&self, key: &str) -> Result<ValidationStatus, ValidationError> {
        if key.is_empty() {
            return Ok(ValidationStatus::NoSuchRequest);
        }
        Ok(match self.records.get(key).await? {
            Some(request) if request.confirmed => ValidationStatus::Confirmed,
            Some(_) => ValidationStatus::Pending,
            None => ValidationStatus::NoSuchRequest,
        })
    }

    /// Whether the request behind `key` was confirmed.
    pub async fn is_confirmed(&self, key: &str) -> Result<bool, ValidationError> {
        match self.status(key).await? {
            ValidationStatus::Confirmed => Ok(true),
            ValidationStatus::Pending => Ok(false),
            ValidationStatus::NoSuchRequest => Err(ValidationError::InvalidOrExpiredKey),
        }
    }

    /// Confirm the request behind `key` and record the address as validated.
    ///
    /// Called when the user opens the emailed link. Returns the username
    /// the request was issued for.
    #[instrument(skip(self))]
    pub async fn confirm_validation(&self, key: &str) -> Result<String, ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::InvalidOrExpiredKey);
        }
        let request = self
            .records
            .get(key)
            .await?
            .ok_or(ValidationError::InvalidOrExpiredKey)?;

        self.validated
            .save_email(ValidatedTarget::new(&request.username, &request.email))
            .await?;
        if !self.records.mark_confirmed(key).await? {
            return Err(ValidationError::InvalidOrExpiredKey);
        }

        info!("Email address confirmed");
        Ok(request.username)
    }

    /// Remove the pending request behind `key`. No-op for an empty key.
    #[instrument(skip(self))]
    pub async fn expire_validation(&self, key: &str) -> Result<(), ValidationError> {
        if key.is_empty() {
            return Ok(());
        }
        if self.records.remove(key).await? {
            debug!("Email validation expired");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::email_service;

    const CONFIRM_URL: &str = "https://id.example/emailvalidation";

    #[tokio::test]
    async fn test_request_sends_link_with_key() {
        let (service, _records, _validated, notifier) = email_service();

        let key = service
            .request_validation("alice_smith_1", "alice@example.com", CONFIRM_URL, "en")
            .await
            .unwrap();

        let sent = notifier.wait_for(1).await;
        assert_eq!(sent[0].target, "alice@example.com");
        assert!(sent[0].message.contains(&format!("k={}", key)));
        assert!(!service.is_confirmed(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_records_validated_email() {
        let (service, _records, validated, _notifier) = email_service();
        let key = service
            .request_validation("alice_smith_1", "alice@example.com", CONFIRM_URL, "en")
            .await
            .unwrap();

        let username = service.confirm_validation(&key).await.unwrap();

        assert_eq!(username, "alice_smith_1");
        assert!(service.is_confirmed(&key).await.unwrap());
        assert_eq!(
            service.status(&key).await.unwrap(),
            ValidationStatus::Confirmed
        );
        assert!(validated
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_confirm_unknown_key() {
        let (service, _records, _validated, _notifier) = email_service();

        let err = service.confirm_validation("missing").await.unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOrExpiredKey));
    }

    #[tokio::test]
    async fn test_expired_key_is_invalid() {
        let (service, records, _validated, _notifier) = email_service();
        let key = service
            .request_validation("alice_smith_1", "alice@example.com", CONFIRM_URL, "en")
            .await
            .unwrap();

        service.expire_validation(&key).await.unwrap();

        assert!(records.get(&key).await.unwrap().is_none());
        let err = service.is_confirmed(&key).await.unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOrExpiredKey));
        let err = service.confirm_validation(&key).await.unwrap_err();
        assert!(matches!(err, ValidationError::InvalidOrExpiredKey));
    }
}
