//! Phone number validation by SMS code.

use crate::dispatch::{DispatchHandle, Notification};
use crate::error::ValidationError;
use crate::messages;
use crate::store::{RecordStore, ValidatedTargetStore};
use crate::types::{PhoneValidationRequest, ValidatedTarget, ValidationStatus};
use crate::ValidationConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Issues and checks phone number validations.
#[derive(Clone)]
pub struct PhoneValidationService {
    records: Arc<dyn RecordStore<PhoneValidationRequest>>,
    validated: Arc<dyn ValidatedTargetStore>,
    dispatch: DispatchHandle,
    config: ValidationConfig,
}

impl PhoneValidationService {
    pub fn new(
        records: Arc<dyn RecordStore<PhoneValidationRequest>>,
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

    /// Create a validation request for `phonenumber` and queue the SMS.
    ///
    /// Returns the new key as soon as the record is stored; delivery happens
    /// in the background and its outcome is not reported here.
    #[instrument(skip(self, confirmation_url))]
    pub async fn request_validation(
        &self,
        username: &str,
        phonenumber: &str,
        confirmation_url: &str,
        locale: &str,
    ) -> Result<String, ValidationError> {
        let request = PhoneValidationRequest::new(
            username,
            phonenumber,
            self.config.code_length,
            self.config.record_ttl,
        );
        let key = request.key.clone();
        let link =
            messages::phone_confirmation_link(confirmation_url, &request.sms_code, &key, locale);
        let text = messages::sms_confirmation(locale, &request.sms_code, &link);

        self.records.insert(request).await?;
        self.dispatch.enqueue(Notification::new(phonenumber, text));

        info!("Phone validation requested");
        Ok(key)
    }

    /// Look up the state of the request behind `key`.
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
    ///
    /// Fails with [`ValidationError::InvalidOrExpiredKey`] when there is no
    /// live request for `key`.
    pub async fn is_confirmed(&self, key: &str) -> Result<bool, ValidationError> {
        match self.status(key).await? {
            ValidationStatus::Confirmed => Ok(true),
            ValidationStatus::Pending => Ok(false),
            ValidationStatus::NoSuchRequest => Err(ValidationError::InvalidOrExpiredKey),
        }
    }

    /// Check `code` against the request and confirm it on a match.
    ///
    /// A match also records the phone number as validated for the owner.
    #[instrument(skip(self, code))]
    pub async fn confirm_validation(&self, key: &str, code: &str) -> Result<(), ValidationError> {
        let request = self.check_code(key, code).await?;
        self.validated
            .save_phone(ValidatedTarget::new(&request.username, &request.phonenumber))
            .await?;
        self.mark_confirmed(key).await
    }

    /// Remove the pending request behind `key`. No-op for an empty key.
    #[instrument(skip(self))]
    pub async fn expire_validation(&self, key: &str) -> Result<(), ValidationError> {
        if key.is_empty() {
            return Ok(());
        }
        if self.records.remove(key).await? {
            debug!("Phone validation expired");
        }
        Ok(())
    }

    async fn check_code(
        &self,
        key: &str,
        code: &str,
    ) -> Result<PhoneValidationRequest, ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::InvalidOrExpiredKey);
        }
        let request = self
            .records
            .get(key)
            .await?
            .ok_or(ValidationError::InvalidOrExpiredKey)?;
        if request.sms_code != code {
            debug!("Submitted SMS code does not match");
            return Err(ValidationError::InvalidCode);
        }
        Ok(request)
    }

    async fn mark_confirmed(&self, key: &str) -> Result<(), ValidationError> {
        if !self.records.mark_confirmed(key).await? {
            return Err(ValidationError::InvalidOrExpiredKey);
        }
        info!("Phone number confirmed");
        Ok(())
    }
}
