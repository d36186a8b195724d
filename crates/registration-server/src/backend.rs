//! Wiring of the registration flow onto in-memory stores.

use crate::config::{Config, MailConfig, SmsConfig};
use notify_client::{LogTransport, MailClient, NotifyError, SmsGatewayClient};
use registration::memory::{
    MemoryCredentialStore, MemoryOrganizationStore, MemoryUserStore, RedirectLogin,
};
use registration::{Collaborators, RegistrationOrchestrator};
use session_store::MemorySessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use validation::{
    Dispatcher, EmailValidationRequest, EmailValidationService, MemoryRecordStore,
    MemoryValidatedTargets, Notifier, PhoneValidationRequest, PhoneValidationService,
};

/// How often expired draft users are purged.
const DRAFT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Outbound transports for both validation channels.
#[derive(Clone)]
pub struct Transports {
    pub sms: Arc<dyn Notifier>,
    pub mail: Arc<dyn Notifier>,
    /// Set when SMS goes through a real gateway, for health reporting
    pub sms_gateway: Option<Arc<SmsGatewayClient>>,
}

impl Transports {
    /// Build the transports described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let (sms, sms_gateway) = sms_transport(&config.sms)?;
        Ok(Self {
            sms,
            mail: mail_transport(&config.mail)?,
            sms_gateway,
        })
    }

    /// Transports that only log.
    pub fn logging() -> Self {
        Self {
            sms: Arc::new(LogTransport),
            mail: Arc::new(LogTransport),
            sms_gateway: None,
        }
    }
}

type SmsTransport = (Arc<dyn Notifier>, Option<Arc<SmsGatewayClient>>);

fn sms_transport(config: &SmsConfig) -> Result<SmsTransport, NotifyError> {
    if !config.enabled {
        info!("SMS gateway disabled, SMS texts will only be logged");
        let transport: Arc<dyn Notifier> = Arc::new(LogTransport);
        return Ok((transport, None));
    }
    let gateway = Arc::new(SmsGatewayClient::new(
        &config.api_url,
        &config.sender,
        config.timeout,
    )?);
    let transport: Arc<dyn Notifier> = gateway.clone();
    Ok((transport, Some(gateway)))
}

fn mail_transport(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.api_key {
        Some(api_key) => Ok(Arc::new(MailClient::new(
            &config.api_url,
            api_key.clone(),
            &config.sender,
            config.sender_name.clone(),
            &config.subject,
            config.timeout,
        )?)),
        None => {
            info!("No mail API key configured, emails will only be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}

/// The orchestrator and the in-memory stores behind it.
pub struct InMemoryBackend {
    pub orchestrator: RegistrationOrchestrator,
    pub sessions: Arc<MemorySessionStore>,
    pub users: Arc<MemoryUserStore>,
    pub organizations: Arc<MemoryOrganizationStore>,
    pub phone_records: Arc<MemoryRecordStore<PhoneValidationRequest>>,
    pub email_records: Arc<MemoryRecordStore<EmailValidationRequest>>,
    /// Dispatcher and purge tasks
    pub tasks: Vec<JoinHandle<()>>,
}

impl InMemoryBackend {
    /// Wire up the flow. Must be called from within a tokio runtime.
    pub fn new(config: &Config, transports: &Transports) -> Self {
        let sessions = Arc::new(MemorySessionStore::new(config.session.ttl));
        let users = Arc::new(MemoryUserStore::new());
        let organizations = Arc::new(MemoryOrganizationStore::new());
        let validated = Arc::new(MemoryValidatedTargets::new());
        let phone_records = Arc::new(MemoryRecordStore::<PhoneValidationRequest>::new());
        let email_records = Arc::new(MemoryRecordStore::<EmailValidationRequest>::new());

        let (sms_dispatch, sms_task) =
            Dispatcher::spawn(transports.sms.clone(), config.dispatch.clone());
        let (mail_dispatch, mail_task) =
            Dispatcher::spawn(transports.mail.clone(), config.dispatch.clone());

        let phone = PhoneValidationService::new(
            phone_records.clone(),
            validated.clone(),
            sms_dispatch,
            config.validation.clone(),
        );
        let email = EmailValidationService::new(
            email_records.clone(),
            validated.clone(),
            mail_dispatch,
            config.validation.clone(),
        );

        let login_url = format!(
            "{}/login",
            config.registration.public_url.trim_end_matches('/')
        );
        let orchestrator = RegistrationOrchestrator::new(
            Collaborators {
                sessions: sessions.clone(),
                users: users.clone(),
                organizations: organizations.clone(),
                credentials: Arc::new(MemoryCredentialStore::new()),
                validated,
                login: Arc::new(RedirectLogin::new(login_url)),
            },
            phone,
            email,
            config.registration.clone(),
        );

        let purge_task = spawn_draft_purge(users.clone());

        Self {
            orchestrator,
            sessions,
            users,
            organizations,
            phone_records,
            email_records,
            tasks: vec![sms_task, mail_task, purge_task],
        }
    }
}

fn spawn_draft_purge(users: Arc<MemoryUserStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(DRAFT_PURGE_INTERVAL).await;
            let purged = users.purge_expired().await;
            if purged > 0 {
                debug!("Purged {} expired draft users", purged);
            }
        }
    })
}
