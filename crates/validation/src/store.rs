//! Validation record persistence.
//!
//! Records carry an absolute expiry. The in-memory stores honor it on every
//! read and run a background sweep so expired records do not accumulate.

use crate::error::ValidationError;
use crate::types::{PendingValidation, ValidatedTarget};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// How often the in-memory stores drop expired records.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Keyed storage for pending validation requests of one channel.
#[async_trait]
pub trait RecordStore<R: PendingValidation>: Send + Sync {
    /// Persist a new request, replacing any record with the same key.
    async fn insert(&self, record: R) -> Result<(), ValidationError>;

    /// Fetch a live (unexpired) record.
    async fn get(&self, key: &str) -> Result<Option<R>, ValidationError>;

    /// Set the confirmation flag. Returns false when no live record exists.
    async fn mark_confirmed(&self, key: &str) -> Result<bool, ValidationError>;

    /// Delete a record. Returns whether one was present.
    async fn remove(&self, key: &str) -> Result<bool, ValidationError>;
}

/// Lookup of targets (phone numbers, email addresses) already proven by a user.
#[async_trait]
pub trait ValidatedTargetStore: Send + Sync {
    async fn get_by_phone(&self, phonenumber: &str)
        -> Result<Option<ValidatedTarget>, ValidationError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<ValidatedTarget>, ValidationError>;

    async fn save_phone(&self, target: ValidatedTarget) -> Result<(), ValidationError>;

    async fn save_email(&self, target: ValidatedTarget) -> Result<(), ValidationError>;
}

/// In-memory record store with expiry.
#[derive(Clone)]
pub struct MemoryRecordStore<R> {
    records: Arc<RwLock<HashMap<String, R>>>,
}

impl<R: PendingValidation> MemoryRecordStore<R> {
    /// Create a store and spawn its expiry sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let store = Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        };

        let sweep_store = store.clone();
        tokio::spawn(async move {
            sweep_store.sweep_loop().await;
        });

        store
    }

    async fn sweep_loop(&self) {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            let removed = self.sweep_expired().await;
            if removed > 0 {
                debug!("Removed {} expired validation records", removed);
            }
        }
    }

    /// Drop every expired record, returning how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.records
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<R: PendingValidation> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PendingValidation> RecordStore<R> for MemoryRecordStore<R> {
    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn insert(&self, record: R) -> Result<(), ValidationError> {
        let mut records = self.records.write().await;
        records.insert(record.key().to_string(), record);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<R>, ValidationError> {
        let records = self.records.read().await;
        let now = Utc::now();
        Ok(records.get(key).filter(|r| !r.is_expired(now)).cloned())
    }

    #[instrument(skip(self))]
    async fn mark_confirmed(&self, key: &str) -> Result<bool, ValidationError> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        match records.get_mut(key).filter(|r| !r.is_expired(now)) {
            Some(record) => {
                record.mark_confirmed();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<bool, ValidationError> {
        let mut records = self.records.write().await;
        Ok(records.remove(key).is_some())
    }
}

/// In-memory validated phone numbers and email addresses.
#[derive(Clone, Default)]
pub struct MemoryValidatedTargets {
    phones: Arc<RwLock<HashMap<String, ValidatedTarget>>>,
    emails: Arc<RwLock<HashMap<String, ValidatedTarget>>>,
}

impl MemoryValidatedTargets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ValidatedTargetStore for MemoryValidatedTargets {
    async fn get_by_phone(
        &self,
        phonenumber: &str,
    ) -> Result<Option<ValidatedTarget>, ValidationError> {
        Ok(self.phones.read().await.get(phonenumber).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<ValidatedTarget>, ValidationError> {
        Ok(self.emails.read().await.get(email).cloned())
    }

    async fn save_phone(&self, target: ValidatedTarget) -> Result<(), ValidationError> {
        debug!(username = %target.username, "Recording validated phone number");
        self.phones
            .write()
            .await
            .insert(target.target.clone(), target);
        Ok(())
    }

    async fn save_email(&self, target: ValidatedTarget) -> Result<(), ValidationError> {
        debug!(username = %target.username, "Recording validated email address");
        self.emails
            .write()
            .await
            .insert(target.target.clone(), target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmailValidationRequest, PhoneValidationRequest};

    fn phone_request(ttl: Duration) -> PhoneValidationRequest {
        PhoneValidationRequest::new("alice_smith_1", "+15550001111", 6, ttl)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryRecordStore::new();
        let record = phone_request(Duration::from_secs(600));
        let key = record.key.clone();

        store.insert(record).await.unwrap();

        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.phonenumber, "+15550001111");
        assert!(!fetched.confirmed);
        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_confirmed_is_monotonic() {
        let store = MemoryRecordStore::new();
        let record = EmailValidationRequest::new("bob_1", "bob@example.com", Duration::from_secs(600));
        let key = record.key.clone();
        store.insert(record).await.unwrap();

        assert!(store.mark_confirmed(&key).await.unwrap());
        assert!(store.mark_confirmed(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().unwrap().confirmed);

        assert!(!store.mark_confirmed("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryRecordStore::new();
        let record = phone_request(Duration::from_secs(600));
        let key = record.key.clone();
        store.insert(record).await.unwrap();

        assert!(store.remove(&key).await.unwrap());
        assert!(!store.remove(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_records_are_invisible() {
        let store = MemoryRecordStore::new();
        let record = phone_request(Duration::from_millis(20));
        let key = record.key.clone();
        store.insert(record).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.mark_confirmed(&key).await.unwrap());
        assert_eq!(store.len().await, 0);
        assert_eq!(store.sweep_expired().await, 1);
    }

    #[tokio::test]
    async fn test_validated_targets() {
        let targets = MemoryValidatedTargets::new();

        targets
            .save_phone(ValidatedTarget::new("alice_smith_1", "+15550001111"))
            .await
            .unwrap();
        targets
            .save_email(ValidatedTarget::new("alice_smith_1", "alice@example.com"))
            .await
            .unwrap();

        let phone = targets.get_by_phone("+15550001111").await.unwrap().unwrap();
        assert_eq!(phone.username, "alice_smith_1");
        assert!(targets.get_by_email("alice@example.com").await.unwrap().is_some());
        assert!(targets.get_by_email("other@example.com").await.unwrap().is_none());
    }
}
