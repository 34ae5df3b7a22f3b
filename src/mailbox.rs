//! Mailbox identity, status, and listing value types
//!
//! Strong types over the raw strings the protocol deals in. A
//! [`MailboxName`] carries both representations of a name: the
//! human-readable display form and the 7-bit transport form produced
//! by the [`crate::utf7`] codec.

use crate::error::Result;
use crate::utf7;
use serde::Serialize;
use std::fmt;

/// A hierarchical mailbox identity: a 7-bit namespace prefix (e.g.
/// `user.` or `INBOX.`) plus a display name that may contain
/// non-ASCII characters.
///
/// # Examples
///
/// ```
/// use mailbox_probe::MailboxName;
///
/// let name = MailboxName::new("user.", "probeböx");
/// assert_eq!(name.display_path(), "user.probeböx");
/// assert_eq!(name.transport_path().unwrap(), "user.probeb&APY-x");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxName {
    prefix: String,
    display: String,
}

impl MailboxName {
    #[must_use]
    pub fn new(prefix: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            display: display.into(),
        }
    }

    /// The namespace prefix, verbatim.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The display name, verbatim.
    #[must_use]
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Full path in display form, e.g. `user.probeböx`.
    #[must_use]
    pub fn display_path(&self) -> String {
        format!("{}{}", self.prefix, self.display)
    }

    /// Full path in 7-bit transport form, e.g. `user.probeb&APY-x`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Encoding`] if the display name cannot
    /// be encoded.
    pub fn transport_path(&self) -> Result<String> {
        Ok(format!("{}{}", self.prefix, utf7::encode(&self.display)?))
    }
}

impl fmt::Display for MailboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.display)
    }
}

/// Point-in-time status snapshot of a mailbox, as returned by a
/// STATUS query. Never merged or diffed; a fresh one is taken per
/// inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MailboxStatus {
    pub messages: u32,
    pub recent: u32,
    pub unseen: u32,
    pub uid_next: u32,
    pub uid_validity: u32,
}

impl fmt::Display for MailboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages={} recent={} unseen={} uidnext={} uidvalidity={}",
            self.messages, self.recent, self.unseen, self.uid_next, self.uid_validity
        )
    }
}

/// One row of a mailbox enumeration: the raw transport-form path plus
/// the attributes the server reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// Mailbox path exactly as the server sent it (transport form).
    pub name: String,
    /// Whether the mailbox can be selected (no `\Noselect`).
    pub selectable: bool,
    /// Whether the server reported child mailboxes.
    pub has_children: bool,
}
