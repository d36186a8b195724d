//! Configuration for the registration server.

use anyhow::{Context, Result};
use registration::RegistrationConfig;
use secrecy::SecretString;
use serde::Deserialize;
use session_store::SessionConfig;
use std::time::Duration;
use validation::{DispatchConfig, ValidationConfig};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Registration flow configuration
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Registration session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Validation request configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Notification dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// SMS gateway configuration
    #[serde(default)]
    pub sms: SmsConfig,

    /// Mail API configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mark the session cookie `Secure`
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// Send through the gateway; when false SMS texts are only logged
    #[serde(default)]
    pub enabled: bool,

    /// SMS gateway URL
    #[serde(default = "default_sms_api_url")]
    pub api_url: String,

    /// Number the messages are sent from
    #[serde(default)]
    pub sender: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Mail API URL
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    /// Mail API key; mail is only logged when unset
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Sender address
    #[serde(default = "default_mail_sender")]
    pub sender: String,

    /// Sender display name
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Subject of validation mails
    #[serde(default = "default_mail_subject")]
    pub subject: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            secure_cookies: true,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_sms_api_url(),
            sender: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: default_mail_api_url(),
            api_key: None,
            sender: default_mail_sender(),
            sender_name: None,
            subject: default_mail_subject(),
            timeout: default_timeout(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_sms_api_url() -> String {
    "http://sms-gateway:8080".into()
}

fn default_mail_api_url() -> String {
    "https://api.brevo.com".into()
}

fn default_mail_sender() -> String {
    "noreply@localhost".into()
}

fn default_mail_subject() -> String {
    "Confirm your email address".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_global_rpm() -> u32 {
    600
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
