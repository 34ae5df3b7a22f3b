//! IMAP implementation of [`MailSession`] over async-imap
//!
//! Covers the three transport modes of [`Security`]: plaintext,
//! STARTTLS with certificate validation against the bundled webpki
//! roots, and STARTTLS accepting any certificate (self-signed
//! servers).

use crate::endpoint::{Endpoint, Protocol, Security};
use crate::error::{Error, Result};
use crate::mailbox::{ListingEntry, MailboxStatus};
use crate::session::MailSession;
use async_imap::Session;
use async_imap::types::{Name, NameAttribute};
use futures::StreamExt;
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info, warn};

type PlainSession = Session<Compat<TcpStream>>;
type TlsSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// The two stream shapes a session can run over.
#[derive(Debug)]
enum Transport {
    Plain(PlainSession),
    Tls(TlsSession),
}

/// Live IMAP session created from an [`Endpoint`] plus credentials.
///
/// Server error text from the most recent failing call is retained
/// and exposed through [`MailSession::last_error`] /
/// [`MailSession::all_errors`].
#[derive(Debug)]
pub struct ImapSession {
    transport: Option<Transport>,
    errors: Vec<String>,
}

impl ImapSession {
    /// Open a connection to `endpoint` and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the endpoint is unreachable, its
    /// protocol is not IMAP, or the login is rejected, and
    /// [`Error::Tls`] if the STARTTLS upgrade or handshake fails.
    pub async fn open(endpoint: &Endpoint, username: &str, password: &str) -> Result<Self> {
        if endpoint.protocol() != Protocol::Imap {
            return Err(Error::Connect(format!(
                "unsupported endpoint protocol '{}'; this session speaks imap only",
                endpoint.protocol()
            )));
        }

        let addr = endpoint.addr();
        debug!("Connecting to mailbox store at {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Connect(format!("connect to {addr} failed: {e}")))?;

        let transport = match endpoint.security() {
            Security::Plain => {
                let client = async_imap::Client::new(tcp_stream.compat());
                let session = client
                    .login(username, password)
                    .await
                    .map_err(|(e, _)| Error::Connect(format!("Login failed: {e}")))?;
                Transport::Plain(session)
            }
            mode @ (Security::Tls | Security::TlsInsecure) => {
                let mut client = async_imap::Client::new(tcp_stream.compat());

                client
                    .run_command_and_check_ok("STARTTLS", None)
                    .await
                    .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;

                let connector = tls_connector(mode == Security::TlsInsecure);
                let server_name = ServerName::try_from(endpoint.host().to_string())
                    .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

                let inner = client.into_inner().into_inner();
                let tls_stream = connector
                    .connect(server_name, inner)
                    .await
                    .map_err(|e| Error::Tls(e.to_string()))?;

                let tls_client = async_imap::Client::new(tls_stream.compat());
                let session = tls_client
                    .login(username, password)
                    .await
                    .map_err(|(e, _)| Error::Connect(format!("Login failed: {e}")))?;
                Transport::Tls(session)
            }
        };

        info!("Connected to mailbox store at {}", addr);
        Ok(Self {
            transport: Some(transport),
            errors: Vec::new(),
        })
    }

    /// Record a failure so `last_error`/`all_errors` can report it.
    fn fail(&mut self, message: String) -> Error {
        self.errors.push(message.clone());
        Error::Imap(message)
    }

    fn closed(&mut self) -> Error {
        self.fail("session is closed".to_string())
    }
}

impl MailSession for ImapSession {
    async fn create_mailbox(&mut self, mailbox: &str) -> Result<()> {
        self.errors.clear();
        debug!("CREATE {}", mailbox);
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => s.create(mailbox).await,
            Some(Transport::Tls(s)) => s.create(mailbox).await,
            None => return Err(self.closed()),
        };
        res.map_err(|e| self.fail(format!("CREATE {mailbox} failed: {e}")))
    }

    async fn list_mailboxes(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<ListingEntry>> {
        self.errors.clear();
        debug!("LIST {:?} {:?}", reference, pattern);
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => collect_entries(s, reference, pattern).await,
            Some(Transport::Tls(s)) => collect_entries(s, reference, pattern).await,
            None => return Err(self.closed()),
        };
        res.map_err(|e| self.fail(format!("LIST {pattern} failed: {e}")))
    }

    async fn get_status(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.errors.clear();
        debug!("STATUS {}", mailbox);
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => s.status(mailbox, STATUS_ITEMS).await,
            Some(Transport::Tls(s)) => s.status(mailbox, STATUS_ITEMS).await,
            None => return Err(self.closed()),
        };
        let mb = res.map_err(|e| self.fail(format!("STATUS {mailbox} failed: {e}")))?;
        Ok(MailboxStatus {
            messages: mb.exists,
            recent: mb.recent,
            unseen: mb.unseen.unwrap_or(0),
            uid_next: mb.uid_next.unwrap_or(0),
            uid_validity: mb.uid_validity.unwrap_or(0),
        })
    }

    async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<()> {
        self.errors.clear();
        debug!("RENAME {} {}", from, to);
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => s.rename(from, to).await,
            Some(Transport::Tls(s)) => s.rename(from, to).await,
            None => return Err(self.closed()),
        };
        res.map_err(|e| self.fail(format!("RENAME {from} to {to} failed: {e}")))
    }

    async fn set_access(&mut self, mailbox: &str, principal: &str, rights: &str) -> Result<()> {
        self.errors.clear();
        debug!("SETACL {} {} {}", mailbox, principal, rights);
        // async-imap has no ACL extension support; issue the command
        // raw (RFC 4314).
        let command = format!("SETACL \"{mailbox}\" \"{principal}\" {rights}");
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => s.run_command_and_check_ok(&command).await,
            Some(Transport::Tls(s)) => s.run_command_and_check_ok(&command).await,
            None => return Err(self.closed()),
        };
        res.map_err(|e| self.fail(format!("SETACL {mailbox} failed: {e}")))
    }

    async fn delete_mailbox(&mut self, mailbox: &str) -> Result<()> {
        self.errors.clear();
        debug!("DELETE {}", mailbox);
        let res = match self.transport.as_mut() {
            Some(Transport::Plain(s)) => s.delete(mailbox).await,
            Some(Transport::Tls(s)) => s.delete(mailbox).await,
            None => return Err(self.closed()),
        };
        res.map_err(|e| self.fail(format!("DELETE {mailbox} failed: {e}")))
    }

    async fn close(&mut self) {
        match self.transport.take() {
            Some(Transport::Plain(mut s)) => {
                s.logout().await.ok();
            }
            Some(Transport::Tls(mut s)) => {
                s.logout().await.ok();
            }
            None => {}
        }
    }

    fn last_error(&self) -> Option<String> {
        self.errors.last().cloned()
    }

    fn all_errors(&self) -> Vec<String> {
        self.errors.clone()
    }
}

const STATUS_ITEMS: &str = "(MESSAGES RECENT UNSEEN UIDNEXT UIDVALIDITY)";

/// Drain a LIST response stream into listing entries, skipping rows
/// the parser rejects.
async fn collect_entries<T>(
    session: &mut Session<T>,
    reference: &str,
    pattern: &str,
) -> std::result::Result<Vec<ListingEntry>, async_imap::error::Error>
where
    T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + fmt::Debug + Send,
{
    let mut stream = session.list(Some(reference), Some(pattern)).await?;
    let mut entries = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(name) => entries.push(entry_from(&name)),
            Err(e) => warn!("Skipping unparsable LIST entry: {}", e),
        }
    }
    drop(stream);
    Ok(entries)
}

fn entry_from(name: &Name) -> ListingEntry {
    let attrs = name.attributes();
    ListingEntry {
        name: name.name().to_string(),
        selectable: !attrs
            .iter()
            .any(|a| matches!(a, NameAttribute::NoSelect)),
        has_children: attrs.iter().any(|a| {
            matches!(
                a,
                NameAttribute::Extension(x) if x.as_ref().eq_ignore_ascii_case("\\HasChildren")
            )
        }),
    }
}

/// Build a TLS connector for the requested validation mode.
fn tls_connector(insecure: bool) -> TlsConnector {
    let config = if insecure {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let root_store = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };
    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier that accepts all certificates (the
/// novalidate-cert transport mode, for self-signed servers).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
