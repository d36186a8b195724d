//! In-memory collaborators for development and tests.

use crate::identity::{
    CredentialError, CredentialStore, DraftUser, LoginHandoff, OrganizationStore, StoreError,
    UserStore,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use session_store::{RegistrationSession, SessionField};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 100;

/// In-memory user store.
///
/// Users whose expiry has passed are treated as absent.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, DraftUser>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every draft whose expiry has passed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, u| u.expire.map_or(true, |e| e > now));
        before - users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.get_by_name(username).await?.is_some())
    }

    async fn get_by_name(&self, username: &str) -> Result<Option<DraftUser>, StoreError> {
        let now = Utc::now();
        Ok(self
            .users
            .read()
            .await
            .get(username)
            .filter(|u| u.expire.map_or(true, |e| e > now))
            .cloned())
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn save(&self, user: DraftUser) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .insert(user.username.clone(), user);
        Ok(())
    }

    async fn save_phone(&self, username: &str, phonenumber: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;
        user.phonenumber = phonenumber.to_string();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_expire_date(&self, username: &str) -> Result<(), StoreError> {
        if let Some(user) = self.users.write().await.get_mut(username) {
            user.expire = None;
        }
        Ok(())
    }

    async fn count_pending_registrations(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.expire.is_some_and(|e| e > now))
            .count())
    }
}

/// In-memory organization names.
#[derive(Clone, Default)]
pub struct MemoryOrganizationStore {
    globalids: Arc<RwLock<HashSet<String>>>,
}

impl MemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, globalid: impl Into<String>) {
        self.globalids.write().await.insert(globalid.into());
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn exists(&self, globalid: &str) -> Result<bool, StoreError> {
        Ok(self.globalids.read().await.contains(globalid))
    }
}

/// In-memory password store keeping salted SHA-256 hashes.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    hashes: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `password` against the stored hash.
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let hashes = self.hashes.read().await;
        let Some(stored) = hashes.get(username) else {
            return false;
        };
        let Some((salt, _)) = stored.split_once('$') else {
            return false;
        };
        hex::decode(salt)
            .map(|salt| hash_password(&salt, password) == *stored)
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    #[instrument(skip(self, password))]
    async fn save(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let len = password.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(CredentialError::Policy("password too short".into()));
        }
        if len > MAX_PASSWORD_LEN {
            return Err(CredentialError::Policy("password too long".into()));
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        self.hashes
            .write()
            .await
            .insert(username.to_string(), hash_password(&salt, password));
        debug!("Password saved");
        Ok(())
    }
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    format!("{}${}", hex::encode(salt), hex::encode(hasher.finalize()))
}

/// Login handoff that redirects to a login URL carrying the saved
/// redirect parameters.
pub struct RedirectLogin {
    login_url: String,
    logins: AtomicUsize,
}

impl RedirectLogin {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            logins: AtomicUsize::new(0),
        }
    }

    /// Number of completed handoffs.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginHandoff for RedirectLogin {
    async fn login(
        &self,
        session: &RegistrationSession,
        username: &str,
    ) -> Result<String, StoreError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        info!(username = %username, "Registered user handed over to login");

        let params = session.get(SessionField::RedirectParams);
        if params.is_empty() {
            Ok(self.login_url.clone())
        } else {
            Ok(format!("{}?{}", self.login_url, params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(username: &str, expire: Option<chrono::DateTime<Utc>>) -> DraftUser {
        DraftUser {
            username: username.into(),
            firstname: "Alice".into(),
            lastname: "Smith".into(),
            email: "alice@example.com".into(),
            phonenumber: "+15550001111".into(),
            expire,
        }
    }

    #[tokio::test]
    async fn test_user_store_pending_count() {
        let users = MemoryUserStore::new();
        users
            .save(draft("alice_smith_1", Some(Utc::now() + Duration::hours(24))))
            .await
            .unwrap();
        users.save(draft("bob_jones_1", None)).await.unwrap();

        assert_eq!(users.count_pending_registrations().await.unwrap(), 1);

        users.remove_expire_date("alice_smith_1").await.unwrap();
        assert_eq!(users.count_pending_registrations().await.unwrap(), 0);
        assert!(users.exists("alice_smith_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_store_expired_draft_is_absent() {
        let users = MemoryUserStore::new();
        users
            .save(draft("alice_smith_1", Some(Utc::now() - Duration::seconds(1))))
            .await
            .unwrap();

        assert!(!users.exists("alice_smith_1").await.unwrap());
        assert_eq!(users.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn test_user_store_save_phone() {
        let users = MemoryUserStore::new();
        users.save(draft("alice_smith_1", None)).await.unwrap();

        users.save_phone("alice_smith_1", "+15550002222").await.unwrap();

        let user = users.get_by_name("alice_smith_1").await.unwrap().unwrap();
        assert_eq!(user.phonenumber, "+15550002222");
        assert!(matches!(
            users.save_phone("nobody", "+15550002222").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_credentials_policy_and_verify() {
        let credentials = MemoryCredentialStore::new();

        let err = credentials.save("alice_smith_1", "short").await.unwrap_err();
        assert!(matches!(err, CredentialError::Policy(_)));

        credentials.save("alice_smith_1", "correct horse").await.unwrap();
        assert!(credentials.verify("alice_smith_1", "correct horse").await);
        assert!(!credentials.verify("alice_smith_1", "wrong horse").await);
        assert!(!credentials.verify("bob", "correct horse").await);
    }

    #[tokio::test]
    async fn test_redirect_login_appends_params() {
        let login = RedirectLogin::new("https://id.example/login");
        let mut session = RegistrationSession::new("registrationdetails", "registration");
        session.set(SessionField::RedirectParams, "client_id=app&state=1");

        let url = login.login(&session, "alice_smith_1").await.unwrap();

        assert_eq!(url, "https://id.example/login?client_id=app&state=1");
        assert_eq!(login.login_count(), 1);
    }
}
