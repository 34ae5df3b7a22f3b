//! Mailbox-store endpoint descriptor
//!
//! An [`Endpoint`] pins down where a probe run talks to: host, port,
//! protocol variant, transport security, and an optional mailbox path.
//! It is built once per run and threaded through every operation;
//! nothing varies it mid-run.
//!
//! The traditional `{host:port/flags}path` spec-string syntax (e.g.
//! `{localhost:993/imap/ssl}INBOX`) is supported via [`FromStr`] and
//! [`fmt::Display`] so endpoints can be written the way mail tools
//! have always spelled them.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Wire protocol spoken at the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Mailbox access (IMAP).
    #[default]
    Imap,
    /// Legacy retrieval (POP3).
    Pop3,
    /// Netnews (NNTP).
    Nntp,
}

impl Protocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
            Self::Nntp => "nntp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport security for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext; no TLS upgrade is attempted.
    Plain,
    /// TLS with certificate validation against the bundled roots.
    #[default]
    Tls,
    /// TLS accepting any certificate (self-signed servers).
    TlsInsecure,
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" | "none" | "notls" => Ok(Self::Plain),
            "tls" | "ssl" => Ok(Self::Tls),
            "tls-insecure" | "novalidate" => Ok(Self::TlsInsecure),
            other => Err(Error::Config(format!("unknown security mode '{other}'"))),
        }
    }
}

/// A mailbox-store location. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    protocol: Protocol,
    security: Security,
    path: Option<String>,
}

impl Endpoint {
    /// A plaintext IMAP endpoint with no mailbox path.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Protocol::Imap,
            security: Security::Plain,
            path: None,
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[must_use]
    pub const fn security(&self) -> Security {
        self.security
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// `host:port`, as expected by a TCP connect.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}:{}/{}", self.host, self.port, self.protocol)?;
        match self.security {
            Security::Plain => write!(f, "/notls")?,
            Security::Tls => write!(f, "/ssl")?,
            Security::TlsInsecure => write!(f, "/ssl/novalidate-cert")?,
        }
        write!(f, "}}")?;
        if let Some(path) = &self.path {
            write!(f, "{path}")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix('{').ok_or_else(|| {
            Error::Config(format!("endpoint '{s}' must start with '{{'"))
        })?;
        let (head, path) = rest.split_once('}').ok_or_else(|| {
            Error::Config(format!("endpoint '{s}' is missing '}}'"))
        })?;

        let mut flags = head.split('/');
        let addr = flags.next().unwrap_or("");
        let (host, port) = addr.split_once(':').ok_or_else(|| {
            Error::Config(format!("endpoint '{s}' is missing a port"))
        })?;
        if host.is_empty() {
            return Err(Error::Config(format!("endpoint '{s}' has an empty host")));
        }
        let port: u16 = port
            .parse()
            .map_err(|e| Error::Config(format!("invalid port '{port}': {e}")))?;

        let mut protocol = Protocol::Imap;
        let mut tls = false;
        let mut novalidate = false;
        for flag in flags {
            match flag {
                "imap" => protocol = Protocol::Imap,
                "pop3" => protocol = Protocol::Pop3,
                "nntp" => protocol = Protocol::Nntp,
                "ssl" | "tls" => tls = true,
                "notls" => tls = false,
                "validate-cert" => novalidate = false,
                "novalidate-cert" => novalidate = true,
                other => {
                    return Err(Error::Config(format!(
                        "unknown endpoint flag '{other}'"
                    )));
                }
            }
        }

        let security = match (tls, novalidate) {
            (false, _) => Security::Plain,
            (true, false) => Security::Tls,
            (true, true) => Security::TlsInsecure,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            protocol,
            security,
            path: (!path.is_empty()).then(|| path.to_string()),
        })
    }
}
