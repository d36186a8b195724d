//! Registration server - HTTP front end for two-channel account registration.
//!
//! Exposes the registration flow over JSON endpoints:
//! - Personal details intake and SMS/email validation issuing
//! - Polling and link endpoints for both confirmations
//! - Final submission with handoff to login

pub mod api;
pub mod backend;
pub mod config;
pub mod error;

pub use backend::InMemoryBackend;
pub use config::Config;
pub use error::ServerError;
