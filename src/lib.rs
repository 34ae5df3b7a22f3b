//! IMAP mailbox lifecycle probe
//!
//! A diagnostic harness that exercises the full lifecycle of a
//! mailbox on a remote store: create, enumerate, inspect status,
//! rename, grant an ACL, delete -- and reports every step's outcome.
//! Mailbox names travel in strict modified UTF-7 ([`utf7`]), and the
//! transport can be plaintext, TLS, or TLS without certificate
//! validation ([`Security`]).
//!
//! The pipeline itself ([`LifecycleProbe`]) is independent of the
//! wire: it drives any [`MailSession`]. [`ImapSession`] is the
//! production implementation over async-imap.

mod config;
mod endpoint;
mod error;
mod imap;
mod mailbox;
mod probe;
mod report;
mod session;
pub mod utf7;

pub use config::ProbeConfig;
pub use endpoint::{Endpoint, Protocol, Security};
pub use error::{Error, Result};
pub use imap::ImapSession;
pub use mailbox::{ListingEntry, MailboxName, MailboxStatus};
pub use probe::LifecycleProbe;
pub use report::{ProbeReport, Step, StepDetail, StepOutcome, StepResult};
pub use session::MailSession;
