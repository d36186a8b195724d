//! The registration flow controller.
//!
//! Every operation works on the caller's [`RegistrationSession`] and saves it
//! through the session store before returning, including on the
//! `SessionExpired` path so the client always receives a usable session key.
//! Concurrent requests on one session are not serialized; the last save wins.

use crate::error::{Reason, RegistrationError};
use crate::identity::{CredentialStore, DraftUser, LoginHandoff, OrganizationStore, UserStore};
use crate::names;
use crate::step::RegistrationStep;
use crate::RegistrationConfig;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use session_store::{RegistrationSession, SessionField, SessionStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use validation::{
    messages::DEFAULT_LOCALE, EmailValidationService, PhoneValidationService, ValidatedTarget,
    ValidatedTargetStore, ValidationError, ValidationStatus,
};

/// Session kind under which registrations are stored.
pub const SESSION_KIND: &str = "registrationdetails";

/// Session name under which registrations are stored.
pub const SESSION_NAME: &str = "registration";

/// Personal details submitted to start or update a registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidateInfoRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub langkey: String,
}

/// Final registration form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub phonenumbercode: String,
    pub password: String,
    pub redirectparams: String,
}

/// Request to send the pending validations again.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResendRequest {
    pub email: String,
    pub phone: String,
    pub langkey: String,
}

/// External services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub organizations: Arc<dyn OrganizationStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub validated: Arc<dyn ValidatedTargetStore>,
    pub login: Arc<dyn LoginHandoff>,
}

/// Drives a registration from personal details to a committed, logged-in
/// account, requiring both a confirmed phone number and a confirmed email
/// address.
#[derive(Clone)]
pub struct RegistrationOrchestrator {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    organizations: Arc<dyn OrganizationStore>,
    credentials: Arc<dyn CredentialStore>,
    validated: Arc<dyn ValidatedTargetStore>,
    login: Arc<dyn LoginHandoff>,
    phone: PhoneValidationService,
    email: EmailValidationService,
    config: RegistrationConfig,
}

impl RegistrationOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        phone: PhoneValidationService,
        email: EmailValidationService,
        config: RegistrationConfig,
    ) -> Self {
        let Collaborators {
            sessions,
            users,
            organizations,
            credentials,
            validated,
            login,
        } = collaborators;

        Self {
            sessions,
            users,
            organizations,
            credentials,
            validated,
            login,
            phone,
            email,
            config,
        }
    }

    pub fn phone_validation(&self) -> &PhoneValidationService {
        &self.phone
    }

    pub fn email_validation(&self) -> &EmailValidationService {
        &self.email
    }

    /// Load the registration session for a cookie value, or a new one.
    pub async fn open_session(
        &self,
        key: Option<&str>,
    ) -> Result<RegistrationSession, RegistrationError> {
        Ok(self.sessions.get(key, SESSION_KIND, SESSION_NAME).await?)
    }

    /// Persist the session so the client gets a cookie for it.
    pub async fn show_registration_form(
        &self,
        session: &mut RegistrationSession,
    ) -> Result<(), RegistrationError> {
        self.sessions.save(session).await?;
        Ok(())
    }

    /// Check a user-chosen username. Returns the rejection reason, if any.
    #[instrument(skip(self))]
    pub async fn validate_username(
        &self,
        username: &str,
    ) -> Result<Option<Reason>, RegistrationError> {
        if !names::validate_username(username) {
            debug!("Invalid username format");
            return Ok(Some(Reason::InvalidUsernameFormat));
        }
        if self.users.exists(username).await? {
            debug!("Username already taken");
            return Ok(Some(Reason::UserExists));
        }
        if self.organizations.exists(username).await? {
            debug!("Organization with this name exists");
            return Ok(Some(Reason::OrganizationExists));
        }
        Ok(None)
    }

    /// Start or update a registration and issue the validations it needs.
    ///
    /// The phone validation is (re)issued whenever the phone number differs
    /// from the one in the session. The email validation is only issued once
    /// the phone is confirmed, and never in the same call as a phone change.
    #[instrument(skip(self, session, info), fields(session_key = %session.key))]
    pub async fn validate_info(
        &self,
        session: &mut RegistrationSession,
        info: &ValidateInfoRequest,
    ) -> Result<(), RegistrationError> {
        if !names::validate_name(&info.firstname.to_lowercase()) {
            debug!("Invalid first name");
            return Err(Reason::InvalidFirstName.into());
        }
        if !names::validate_name(&info.lastname.to_lowercase()) {
            debug!("Invalid last name");
            return Err(Reason::InvalidLastName.into());
        }

        let pending = self.users.count_pending_registrations().await?;
        if pending >= self.config.max_pending_registrations {
            warn!(pending, "Maximum number of pending registrations reached");
            return Err(RegistrationError::CapacityReached);
        }

        let mut username = self
            .available_username(&info.firstname, &info.lastname)
            .await?;

        let email = info.email.to_lowercase();
        if !names::validate_email(&email) {
            debug!("Invalid email address");
            return Err(Reason::InvalidEmailFormat.into());
        }
        let session_username = session.get(SessionField::Username).to_string();
        let owned_elsewhere =
            |fact: Option<ValidatedTarget>| fact.is_some_and(|f| f.username != session_username);

        if owned_elsewhere(self.validated.get_by_email(&email).await?) {
            debug!("Email address already validated by another user");
            return Err(Reason::EmailAlreadyUsed.into());
        }
        if !names::validate_phonenumber(&info.phone) {
            debug!("Invalid phone number");
            return Err(Reason::InvalidPhonenumber.into());
        }
        if owned_elsewhere(self.validated.get_by_phone(&info.phone).await?) {
            debug!("Phone number already validated by another user");
            return Err(Reason::PhoneAlreadyUsed.into());
        }

        let phone_changed = session.get(SessionField::Phonenumber) != info.phone;
        let email_changed = session.get(SessionField::Email) != email;

        let existing = if session_username.is_empty() {
            None
        } else {
            self.users.get_by_name(&session_username).await?
        };

        match existing {
            None => {
                debug!(username = %username, "Creating draft user");
                let grace = ChronoDuration::from_std(self.config.draft_grace)
                    .unwrap_or_else(|_| ChronoDuration::hours(24));
                self.users
                    .save(DraftUser {
                        username: username.clone(),
                        firstname: info.firstname.clone(),
                        lastname: info.lastname.clone(),
                        email: email.clone(),
                        phonenumber: info.phone.clone(),
                        expire: Some(Utc::now() + grace),
                    })
                    .await?;
                session.set(SessionField::Username, username.as_str());
            }
            Some(mut user) => {
                // Keep the username: a saved password or confirmed channel
                // already points at it.
                user.firstname = info.firstname.clone();
                user.lastname = info.lastname.clone();
                user.email = email.clone();
                user.phonenumber = info.phone.clone();
                self.users.save(user).await?;
                username = session_username.clone();
            }
        }

        let password_digest = digest(&info.password);
        if session.get(SessionField::Password) != password_digest || session_username != username {
            debug!("Saving user password");
            if let Err(e) = self.credentials.save(&username, &info.password).await {
                let e = RegistrationError::from(e);
                if e.is_expected() {
                    debug!("Password rejected");
                } else {
                    error!("Failed to save password: {}", e);
                }
                return Err(e);
            }
            session.set(SessionField::Password, password_digest);
        }

        let old_phone_key = session
            .get(SessionField::PhonenumberValidationKey)
            .to_string();
        let phone_confirmed = self.phone.status(&old_phone_key).await?.is_confirmed();
        let locale = locale_or_default(&info.langkey);

        session.set(SessionField::Phonenumber, info.phone.as_str());
        if phone_changed {
            self.expire_phone_validation(&old_phone_key).await;
            let key = self
                .phone
                .request_validation(&username, &info.phone, &self.phone_confirmation_url(), locale)
                .await?;
            session.set(SessionField::PhonenumberValidationKey, key);
        }

        session.set(SessionField::Email, email.as_str());
        if email_changed && phone_confirmed && !phone_changed {
            let old_email_key = session.get(SessionField::EmailValidationKey).to_string();
            self.expire_email_validation(&old_email_key).await;
            let key = self
                .email
                .request_validation(&username, &email, &self.email_confirmation_url(), locale)
                .await?;
            session.set(SessionField::EmailValidationKey, key);
        }

        self.sessions.save(session).await?;
        info!(username = %username, phone_changed, email_changed, "Registration details accepted");
        Ok(())
    }

    /// Finish the registration and hand the user over to login.
    ///
    /// Confirms the phone with the submitted code when it is not confirmed
    /// yet. Returns the login handoff's redirect target.
    #[instrument(skip(self, session, form), fields(session_key = %session.key))]
    pub async fn process_registration_form(
        &self,
        session: &mut RegistrationSession,
        form: &RegistrationForm,
    ) -> Result<String, RegistrationError> {
        self.require_established(session).await?;

        let username = session.get(SessionField::Username).to_string();
        let phone_key = session
            .get(SessionField::PhonenumberValidationKey)
            .to_string();

        if !self.phone.status(&phone_key).await?.is_confirmed() {
            if form.phonenumbercode.is_empty() {
                debug!("No SMS code provided and phone not confirmed yet");
                return Err(RegistrationError::BadRequest("phone number not confirmed"));
            }
            self.confirm_phone_code(session, &phone_key, &form.phonenumbercode)
                .await?;
        }
        self.users.remove_expire_date(&username).await?;

        let email_key = session.get(SessionField::EmailValidationKey).to_string();
        if !self.email.status(&email_key).await?.is_confirmed() {
            debug!("Email not confirmed yet");
            return Err(RegistrationError::BadRequest("email address not confirmed"));
        }

        // The login step reads the redirect parameters from this session, so
        // it is emptied rather than removed.
        session.clear();
        session.set(SessionField::RedirectParams, form.redirectparams.as_str());
        self.sessions.save(session).await?;

        info!(username = %username, "Registration completed");
        Ok(self.login.login(session, &username).await?)
    }

    /// Send the pending validations again.
    ///
    /// The phone code goes to the number stored in the session. The email is
    /// only resent once the phone is confirmed, and only to the address
    /// stored in the session.
    #[instrument(skip(self, session, request), fields(session_key = %session.key))]
    pub async fn resend_validation_info(
        &self,
        session: &mut RegistrationSession,
        request: &ResendRequest,
    ) -> Result<(), RegistrationError> {
        let email = request.email.to_lowercase();
        self.require_established(session).await?;

        let username = session.get(SessionField::Username).to_string();
        let locale = locale_or_default(&request.langkey);

        let phone_key = session
            .get(SessionField::PhonenumberValidationKey)
            .to_string();
        let phone_status = match self.phone.status(&phone_key).await {
            Ok(status) => Some(status),
            Err(e) => {
                error!("Failed to check if phone number is already confirmed: {}", e);
                None
            }
        };
        let phone_confirmed = phone_status.is_some_and(ValidationStatus::is_confirmed);

        match phone_status {
            Some(ValidationStatus::Pending) => {
                self.expire_phone_validation(&phone_key).await;
                let phonenumber = session.get(SessionField::Phonenumber).to_string();
                let key = self
                    .phone
                    .request_validation(
                        &username,
                        &phonenumber,
                        &self.phone_confirmation_url(),
                        locale,
                    )
                    .await?;
                session.set(SessionField::PhonenumberValidationKey, key);
            }
            Some(ValidationStatus::Confirmed) => {
                debug!("Phone already confirmed, not resending");
            }
            Some(ValidationStatus::NoSuchRequest) => {
                debug!("No live phone validation to resend");
            }
            None => {}
        }

        let email_key = session.get(SessionField::EmailValidationKey).to_string();
        match self.email.status(&email_key).await {
            Ok(ValidationStatus::Confirmed) => {
                debug!("Email already confirmed, not resending");
            }
            Ok(_) if phone_confirmed => {
                self.expire_email_validation(&email_key).await;
                if session.get(SessionField::Email) != email {
                    self.sessions.save(session).await?;
                    info!("Resend requested for an email address other than the session's");
                    return Err(RegistrationError::SessionExpired);
                }
                let key = self
                    .email
                    .request_validation(&username, &email, &self.email_confirmation_url(), locale)
                    .await?;
                session.set(SessionField::EmailValidationKey, key);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to check if email address is already confirmed: {}", e);
            }
        }

        self.sessions.save(session).await?;
        Ok(())
    }

    /// Poll whether the phone was confirmed, e.g. through the SMS link.
    ///
    /// Reports `true` when there is nothing left to wait for so the client
    /// submits its form and the form handler sorts out what is missing.
    pub async fn check_phone_confirmation(
        &self,
        session: &RegistrationSession,
    ) -> Result<bool, RegistrationError> {
        if session.is_new {
            warn!("Phone confirmation polled without a registration session");
            return Ok(true);
        }
        let key = session.get(SessionField::PhonenumberValidationKey);
        Ok(self.phone.status(key).await? != ValidationStatus::Pending)
    }

    /// Poll whether the email link was opened.
    pub async fn check_email_confirmation(
        &self,
        session: &RegistrationSession,
    ) -> Result<bool, RegistrationError> {
        if session.is_new {
            warn!("Email confirmation polled without a registration session");
            return Ok(true);
        }
        let key = session.get(SessionField::EmailValidationKey);
        Ok(self.email.status(key).await? != ValidationStatus::Pending)
    }

    /// Confirm the phone from the SMS code form.
    #[instrument(skip(self, session, smscode), fields(session_key = %session.key))]
    pub async fn confirm_phone(
        &self,
        session: &mut RegistrationSession,
        smscode: &str,
    ) -> Result<bool, RegistrationError> {
        self.require_established(session).await?;

        let username = session.get(SessionField::Username).to_string();
        let key = session
            .get(SessionField::PhonenumberValidationKey)
            .to_string();

        if !self.phone.status(&key).await?.is_confirmed() {
            if smscode.is_empty() {
                debug!("Empty SMS code");
                return Err(RegistrationError::BadRequest("missing SMS code"));
            }
            self.confirm_phone_code(session, &key, smscode).await?;
        }

        self.users.remove_expire_date(&username).await?;
        Ok(true)
    }

    /// Send a new SMS code, possibly to a corrected phone number.
    ///
    /// Returns the URL of the SMS confirmation step.
    #[instrument(skip(self, session), fields(session_key = %session.key))]
    pub async fn resend_phone_confirmation(
        &self,
        session: &mut RegistrationSession,
        phonenumber: &str,
        langkey: &str,
    ) -> Result<String, RegistrationError> {
        self.require_established(session).await?;

        let username = session.get(SessionField::Username).to_string();
        let old_key = session
            .get(SessionField::PhonenumberValidationKey)
            .to_string();
        self.expire_phone_validation(&old_key).await;

        if !names::validate_phonenumber(phonenumber) {
            debug!("Invalid phone number");
            return Err(Reason::InvalidPhonenumber.into());
        }

        self.users.save_phone(&username, phonenumber).await?;
        let key = self
            .phone
            .request_validation(
                &username,
                phonenumber,
                &self.phone_confirmation_url(),
                locale_or_default(langkey),
            )
            .await?;
        session.set(SessionField::PhonenumberValidationKey, key);
        session.set(SessionField::Phonenumber, phonenumber);

        self.sessions.save(session).await?;
        Ok(format!("{}/register/#smsconfirmation", self.public_url()))
    }

    /// Derive the step the session is at.
    pub async fn current_step(
        &self,
        session: &RegistrationSession,
    ) -> Result<RegistrationStep, RegistrationError> {
        if session.is_new {
            return Ok(RegistrationStep::NoSession);
        }
        if session.get(SessionField::Username).is_empty() {
            return Ok(if session.get(SessionField::RedirectParams).is_empty() {
                RegistrationStep::NoSession
            } else {
                RegistrationStep::Completed
            });
        }

        let phone_key = session.get(SessionField::PhonenumberValidationKey);
        if !self.phone.status(phone_key).await?.is_confirmed() {
            return Ok(RegistrationStep::AwaitingPhoneConfirmation);
        }
        let email_key = session.get(SessionField::EmailValidationKey);
        if !self.email.status(email_key).await?.is_confirmed() {
            return Ok(RegistrationStep::AwaitingEmailConfirmation);
        }
        Ok(RegistrationStep::AwaitingSubmission)
    }

    /// Smallest `first_last_N` (N >= 1) not held by a user or organization.
    async fn available_username(
        &self,
        firstname: &str,
        lastname: &str,
    ) -> Result<String, RegistrationError> {
        let base = names::username_base(firstname, lastname);
        let mut counter: u64 = 0;
        loop {
            counter += 1;
            let candidate = format!("{}{}", base, counter);
            if self.users.exists(&candidate).await? {
                continue;
            }
            if self.organizations.exists(&candidate).await? {
                continue;
            }
            return Ok(candidate);
        }
    }

    /// Save a new session and fail; pass an established one through.
    async fn require_established(
        &self,
        session: &mut RegistrationSession,
    ) -> Result<(), RegistrationError> {
        if session.is_new {
            self.sessions.save(session).await?;
            debug!("Registration session expired");
            return Err(RegistrationError::SessionExpired);
        }
        Ok(())
    }

    async fn confirm_phone_code(
        &self,
        session: &mut RegistrationSession,
        key: &str,
        code: &str,
    ) -> Result<(), RegistrationError> {
        match self.phone.confirm_validation(key, code).await {
            Ok(()) => Ok(()),
            Err(ValidationError::InvalidCode) => {
                debug!("Invalid SMS code");
                Err(Reason::InvalidSmsCode.into())
            }
            Err(ValidationError::InvalidOrExpiredKey) => {
                self.sessions.save(session).await?;
                debug!("Phone validation expired");
                Err(RegistrationError::SessionExpired)
            }
            Err(e) => {
                error!("Failed to confirm phone number: {}", e);
                Err(e.into())
            }
        }
    }

    async fn expire_phone_validation(&self, key: &str) {
        if let Err(e) = self.phone.expire_validation(key).await {
            debug!("Ignoring failure to expire phone validation: {}", e);
        }
    }

    async fn expire_email_validation(&self, key: &str) {
        if let Err(e) = self.email.expire_validation(key).await {
            debug!("Ignoring failure to expire email validation: {}", e);
        }
    }

    fn public_url(&self) -> &str {
        self.config.public_url.trim_end_matches('/')
    }

    fn phone_confirmation_url(&self) -> String {
        format!("{}/phonevalidation", self.public_url())
    }

    fn email_confirmation_url(&self) -> String {
        format!("{}/emailvalidation", self.public_url())
    }
}

fn locale_or_default(langkey: &str) -> &str {
    if langkey.is_empty() {
        DEFAULT_LOCALE
    } else {
        langkey
    }
}

/// Password fingerprint kept in the session to detect changes.
fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
