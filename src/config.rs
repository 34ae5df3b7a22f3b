//! Probe connection configuration

use crate::endpoint::{Endpoint, Security};
use crate::error::{Error, Result};
use std::env;

/// Connection configuration for a probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: Security,
    pub namespace: String,
}

impl ProbeConfig {
    /// Load probe configuration from environment variables.
    ///
    /// Reads from `.env` if present. Required variables:
    /// - `PROBE_USERNAME`
    /// - `PROBE_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `PROBE_HOST` (default: `127.0.0.1`)
    /// - `PROBE_PORT` (default: `143`)
    /// - `PROBE_SECURITY` (default: `plain`; one of `plain`, `tls`,
    ///   `tls-insecure`)
    /// - `PROBE_NAMESPACE` (default: `INBOX.`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is unset or
    /// a value fails to parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("PROBE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PROBE_PORT")
                .unwrap_or_else(|_| "143".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid PROBE_PORT: {e}")))?,
            username: env::var("PROBE_USERNAME")
                .map_err(|_| Error::Config("PROBE_USERNAME not set".into()))?,
            password: env::var("PROBE_PASSWORD")
                .map_err(|_| Error::Config("PROBE_PASSWORD not set".into()))?,
            security: env::var("PROBE_SECURITY")
                .unwrap_or_else(|_| "plain".to_string())
                .parse()?,
            namespace: env::var("PROBE_NAMESPACE").unwrap_or_else(|_| "INBOX.".to_string()),
        })
    }

    /// The endpoint this configuration points at.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port).with_security(self.security)
    }
}
