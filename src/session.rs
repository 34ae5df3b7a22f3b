//! Session-layer seam between the lifecycle probe and the wire
//!
//! [`MailSession`] is the contract the probe drives: one method per
//! mailbox operation, plus error introspection mirroring the classic
//! `imap_last_error()` / `imap_errors()` pair. The production
//! implementation is [`crate::ImapSession`]; tests substitute scripted
//! sessions.

use crate::error::Result;
use crate::mailbox::{ListingEntry, MailboxStatus};

/// A live, authenticated session against a mailbox store.
///
/// All mailbox arguments are transport-form paths (7-bit, modified
/// UTF-7 where needed). Each call issues exactly one command; no
/// retries happen at this layer.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Create a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn create_mailbox(&mut self, mailbox: &str) -> Result<()>;

    /// Enumerate mailboxes under `reference` matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn list_mailboxes(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<ListingEntry>>;

    /// Query the full status snapshot of a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn get_status(&mut self, mailbox: &str) -> Result<MailboxStatus>;

    /// Rename a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<()>;

    /// Grant `principal` the given `rights` on a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn set_access(
        &mut self,
        mailbox: &str,
        principal: &str,
        rights: &str,
    ) -> Result<()>;

    /// Delete a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the command.
    async fn delete_mailbox(&mut self, mailbox: &str) -> Result<()>;

    /// Log out and release the connection. Further calls fail; a
    /// second close is a no-op.
    async fn close(&mut self);

    /// The most recent server error message, if any call has failed.
    fn last_error(&self) -> Option<String>;

    /// Every server error/warning message captured by the most recent
    /// failing call, verbatim and in order.
    fn all_errors(&self) -> Vec<String>;
}
