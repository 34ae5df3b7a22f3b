//! In-process fake IMAP server for integration testing
//!
//! # Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   (TLS mode only) Client sends STARTTLS, TLS handshake follows
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client issues commands: CREATE, LIST, STATUS, RENAME, SETACL,
//!   DELETE, ...
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! ## Command format
//!
//! Every client command starts with a **tag** -- an arbitrary string
//! the client chooses (async-imap uses `A0001`, `A0002`, etc.). The
//! server echoes this tag in its completion response so the client can
//! match responses to commands:
//!
//! ```text
//!   Client:  A0003 CREATE "user.probebox"
//!   Server:  A0003 OK CREATE completed
//! ```
//!
//! Lines prefixed with `*` are **untagged** responses -- data the
//! server sends before the final tagged OK/NO/BAD:
//!
//! ```text
//!   Client:  A0005 STATUS "user.probebox" (MESSAGES RECENT UNSEEN UIDNEXT UIDVALIDITY)
//!   Server:  * STATUS "user.probebox" (MESSAGES 0 RECENT 0 UNSEEN 0 UIDNEXT 1 UIDVALIDITY 1000)
//!   Server:  A0005 OK STATUS completed
//! ```
//!
//! Commands are parsed with `imap-codec`'s `CommandCodec`, except for
//! SETACL: that is an RFC 4314 extension the codec does not know, so
//! the dispatch loop recognizes it by hand before handing the line to
//! the codec.

use super::handlers::{
    handle_capability, handle_create, handle_delete, handle_list, handle_login, handle_logout,
    handle_noop, handle_rename, handle_setacl, handle_status,
};
use super::io::write_line;
use super::store::MailStore;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::{ListMailbox, Mailbox as ImapMailbox};
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server that runs on localhost with an OS-assigned port.
///
/// In TLS mode the server generates a self-signed certificate at
/// startup using `rcgen`, so no cert files are needed. It speaks
/// enough of the IMAP protocol to exercise the full mailbox lifecycle:
/// greeting -> STARTTLS -> TLS -> LOGIN -> commands -> LOGOUT. In
/// plaintext mode the STARTTLS phase is skipped and commands flow over
/// the raw TCP stream.
pub struct FakeImapServer {
    port: u16,
    store: Arc<Mutex<MailStore>>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a fake IMAP server that requires a STARTTLS upgrade.
    pub async fn start(store: MailStore) -> Self {
        Self::spawn(store, true).await
    }

    /// Start a fake IMAP server that speaks plaintext IMAP only.
    pub async fn start_plain(store: MailStore) -> Self {
        Self::spawn(store, false).await
    }

    /// 1. Binds to `127.0.0.1:0` -- the OS picks a free port.
    /// 2. In TLS mode, generates a self-signed certificate via `rcgen`.
    /// 3. Spawns a tokio task that accepts connections and speaks IMAP.
    ///
    /// The server runs until the `FakeImapServer` is dropped (the
    /// tokio task is aborted).
    async fn spawn(store: MailStore, tls: bool) -> Self {
        // Ensure the ring crypto provider is installed process-wide.
        // Multiple tests may race to install it, so the error is
        // ignored if it's already set.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = if tls {
            // "127.0.0.1" as the subject alt name since that's what
            // the client connects to.
            let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
                .expect("generate self-signed cert");

            let cert_der = cert.cert.der().clone();
            let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

            let tls_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(vec![cert_der], key_der.into())
                .expect("build server TLS config");

            Some(TlsAcceptor::from(Arc::new(tls_config)))
        } else {
            None
        };

        let store = Arc::new(Mutex::new(store));
        let shared = store.clone();

        // Accept loop. Each incoming connection gets its own task that
        // runs the IMAP state machine.
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &store).await;
                });
            }
        });

        Self {
            port,
            store: shared,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Snapshot of the current server-side state, for assertions.
    pub fn store(&self) -> MailStore {
        self.store.lock().unwrap().clone()
    }
}

/// Handle a single IMAP client connection.
///
/// 1. Send the server greeting on the raw TCP stream
/// 2. In TLS mode, wait for STARTTLS and upgrade the connection
/// 3. Process authenticated commands (LOGIN, CREATE, LIST, etc.)
async fn handle_connection(
    stream: tokio::net::TcpStream,
    acceptor: Option<TlsAcceptor>,
    store: &Mutex<MailStore>,
) {
    let mut reader = BufReader::new(stream);

    // RFC 3501 Section 7.1.1: Server greeting
    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    let Some(acceptor) = acceptor else {
        return run_session(reader.into_inner(), store).await;
    };

    // Read the STARTTLS command.
    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return;
    }

    let parts: Vec<&str> = line.trim().splitn(2, ' ').collect();
    if parts.len() < 2 {
        return;
    }
    let tag = parts[0];
    let command = parts[1].to_uppercase();

    if command != "STARTTLS" {
        let resp = format!("{tag} BAD Expected STARTTLS\r\n");
        let _ = write_line(&mut reader, &resp).await;
        return;
    }

    let resp = format!("{tag} OK Begin TLS negotiation now\r\n");
    if write_line(&mut reader, &resp).await.is_err() {
        return;
    }

    let tcp = reader.into_inner();
    let Ok(tls_stream) = acceptor.accept(tcp).await else {
        return;
    };

    run_session(tls_stream, store).await;
}

/// Extract the folder name from a parsed `imap_types::Mailbox`.
fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Extract the pattern from a parsed `imap_types::ListMailbox`.
fn list_pattern(pattern: &ListMailbox<'_>) -> String {
    match pattern {
        ListMailbox::Token(token) => {
            let bytes: &[u8] = token.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
        ListMailbox::String(s) => {
            let bytes: &[u8] = s.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// SETACL (RFC 4314) is not in imap-codec's RFC 3501 grammar, so it is
/// recognized before codec dispatch. Quoted arguments must not contain
/// spaces, which holds for every name this test suite sends.
fn parse_setacl(line: &str) -> Option<(String, String, String, String)> {
    let mut parts = line.split_whitespace();
    let tag = parts.next()?;
    if !parts.next()?.eq_ignore_ascii_case("SETACL") {
        return None;
    }
    let mailbox = parts.next()?.trim_matches('"');
    let principal = parts.next()?.trim_matches('"');
    let rights = parts.next()?;
    Some((
        tag.to_string(),
        mailbox.to_string(),
        principal.to_string(),
        rights.to_string(),
    ))
}

/// Run the authenticated IMAP command loop over an established stream.
///
/// Uses `imap-codec`'s `CommandCodec` to parse each client command
/// into a strongly-typed `Command`, then dispatches to the appropriate
/// handler based on the `CommandBody` variant.
///
/// Read handlers receive a snapshot (`MailStore` clone) taken under
/// lock. Write handlers receive `&Mutex<MailStore>` and lock briefly
/// to mutate state.
async fn run_session<S: AsyncRead + AsyncWrite + Unpin>(stream: S, store: &Mutex<MailStore>) {
    let mut reader = BufReader::new(stream);
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((tag, mb, principal, rights)) = parse_setacl(trimmed) {
            handle_setacl(&tag, &mb, &principal, &rights, store, &mut reader).await;
            continue;
        }

        let line_bytes = line.as_bytes();
        let Ok((_, command)) = codec.decode(line_bytes) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        // Snapshot for read-only handlers.
        let snap = store.lock().unwrap().clone();

        match command.body {
            CommandBody::Capability => {
                handle_capability(tag, &mut reader).await;
            }
            CommandBody::Noop => {
                handle_noop(tag, &mut reader).await;
            }
            CommandBody::Login { .. } => {
                if !handle_login(tag, &mut reader).await {
                    break;
                }
            }
            CommandBody::Create { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                handle_create(tag, &name, store, &mut reader).await;
            }
            CommandBody::Delete { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                handle_delete(tag, &name, store, &mut reader).await;
            }
            CommandBody::Rename { from, to, .. } => {
                let from = mailbox_name(&from);
                let to = mailbox_name(&to);
                handle_rename(tag, &from, &to, store, &mut reader).await;
            }
            CommandBody::List {
                mailbox_wildcard, ..
            } => {
                let pattern = list_pattern(&mailbox_wildcard);
                handle_list(tag, &pattern, &snap, &mut reader).await;
            }
            CommandBody::Status { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                handle_status(tag, &name, &snap, &mut reader).await;
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_setacl;

    #[test]
    fn parses_quoted_setacl_line() {
        let parsed = parse_setacl("A5 SETACL \"user.probebox\" \"anyone\" c");
        assert_eq!(
            parsed,
            Some((
                "A5".to_string(),
                "user.probebox".to_string(),
                "anyone".to_string(),
                "c".to_string()
            ))
        );
    }

    #[test]
    fn setacl_is_case_insensitive() {
        assert!(parse_setacl("a1 setacl \"x\" \"y\" lrswipkxte").is_some());
    }

    #[test]
    fn other_commands_are_not_setacl() {
        assert!(parse_setacl("A2 CREATE \"user.probebox\"").is_none());
        assert!(parse_setacl("A3 LOGOUT").is_none());
    }
}
