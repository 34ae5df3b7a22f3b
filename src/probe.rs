//! Mailbox lifecycle orchestrator
//!
//! [`LifecycleProbe`] drives a fixed pipeline over any
//! [`MailSession`]: create, enumerate, status, rename, set ACL,
//! delete, close. Each step's result gates what runs next:
//!
//! - a Create failure aborts everything except Close;
//! - a wrong enumeration cardinality is a recorded mismatch, not an
//!   abort;
//! - a Status failure skips Rename but nothing later;
//! - a successful Rename switches the name later steps act on;
//! - Delete always runs against the original path once Create
//!   succeeded;
//! - Close runs unconditionally, exactly once.
//!
//! The probe itself never fails: every run over a session yields a
//! [`ProbeReport`], possibly one that describes failures.

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::mailbox::MailboxName;
use crate::report::{ProbeReport, Step, StepDetail, StepOutcome};
use crate::session::MailSession;
use tracing::{info, warn};

/// Parameters for one mailbox-lifecycle run.
pub struct LifecycleProbe {
    endpoint: Endpoint,
    namespace: String,
    first_name: String,
    second_name: String,
    principal: String,
    rights: String,
}

impl LifecycleProbe {
    /// A probe creating `probebox` under `namespace`, renaming it to
    /// `probeböx`, and granting `anyone` the create right.
    #[must_use]
    pub fn new(endpoint: Endpoint, namespace: impl Into<String>) -> Self {
        Self {
            endpoint,
            namespace: namespace.into(),
            first_name: "probebox".to_string(),
            second_name: "probeböx".to_string(),
            principal: "anyone".to_string(),
            rights: "c".to_string(),
        }
    }

    /// Override the two display names the run cycles through. They
    /// should be distinct; the second may contain non-ASCII
    /// characters.
    #[must_use]
    pub fn with_names(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.second_name = second.into();
        self
    }

    /// Override the ACL grant issued by the set-access step.
    #[must_use]
    pub fn with_acl(mut self, principal: impl Into<String>, rights: impl Into<String>) -> Self {
        self.principal = principal.into();
        self.rights = rights.into();
        self
    }

    /// Run the full lifecycle over `session`.
    ///
    /// The session is owned by the probe for the duration of the run
    /// and closed on every exit path, including an aborted pipeline.
    pub async fn run<S: MailSession>(&self, mut session: S) -> ProbeReport {
        info!("Probing mailbox lifecycle at {}", self.endpoint);
        let mut report = ProbeReport::new();
        self.pipeline(&mut session, &mut report).await;
        session.close().await;
        report.record(Step::Close, StepOutcome::passed(None));
        report
    }

    async fn pipeline<S: MailSession>(&self, session: &mut S, report: &mut ProbeReport) {
        let target = MailboxName::new(&self.namespace, &self.first_name);
        let target_path = match target.transport_path() {
            Ok(path) => path,
            Err(e) => {
                // Encoding failure is fatal to the step that needed
                // it; for Create that means the whole run.
                report.record(
                    Step::Create,
                    StepOutcome::Failed {
                        message: e.to_string(),
                        server_errors: Vec::new(),
                    },
                );
                return;
            }
        };

        if !self.create(session, &target_path, report).await {
            return;
        }
        self.enumerate(session, &target_path, report).await;
        let status_ok = self.inspect(session, &target_path, report).await;

        // The one piece of cross-step mutable state: which path is
        // currently valid. Only a successful rename changes it.
        let mut effective = target_path.clone();
        if status_ok {
            if let Some(renamed) = self.rename(session, &target_path, report).await {
                effective = renamed;
            }
        }

        self.grant(session, &effective, report).await;

        // Cleanup deliberately targets the pre-rename path; when the
        // rename went through this shows up as a recorded failure.
        self.cleanup(session, &target_path, report).await;
    }

    async fn create<S: MailSession>(
        &self,
        session: &mut S,
        path: &str,
        report: &mut ProbeReport,
    ) -> bool {
        match session.create_mailbox(path).await {
            Ok(()) => {
                info!("Created mailbox {}", path);
                report.record(
                    Step::Create,
                    StepOutcome::passed(Some(StepDetail::Note(format!("created {path}")))),
                );
                true
            }
            Err(e) => {
                warn!("Mailbox creation failed, aborting run: {}", e);
                report.record(Step::Create, failure(&e, session));
                false
            }
        }
    }

    async fn enumerate<S: MailSession>(
        &self,
        session: &mut S,
        path: &str,
        report: &mut ProbeReport,
    ) {
        match session.list_mailboxes("", path).await {
            Ok(entries) => {
                let matching = entries.iter().filter(|e| e.name == path).count();
                if matching == 1 && entries.len() == 1 {
                    report.record(
                        Step::List,
                        StepOutcome::passed(Some(StepDetail::Listing(entries))),
                    );
                } else {
                    warn!(
                        "Listing for {} returned {} entries ({} matching)",
                        path,
                        entries.len(),
                        matching
                    );
                    report.record(
                        Step::List,
                        StepOutcome::Inconsistent {
                            message: format!(
                                "expected exactly one listing entry for {path}, got {} ({matching} matching)",
                                entries.len()
                            ),
                        },
                    );
                }
            }
            Err(e) => report.record(Step::List, failure(&e, session)),
        }
    }

    async fn inspect<S: MailSession>(
        &self,
        session: &mut S,
        path: &str,
        report: &mut ProbeReport,
    ) -> bool {
        match session.get_status(path).await {
            Ok(status) => {
                info!("Status of {}: {}", path, status);
                report.record(
                    Step::Status,
                    StepOutcome::passed(Some(StepDetail::Status(status))),
                );
                true
            }
            Err(e) => {
                warn!("Status query failed, skipping rename: {}", e);
                report.record(Step::Status, failure(&e, session));
                false
            }
        }
    }

    async fn rename<S: MailSession>(
        &self,
        session: &mut S,
        from: &str,
        report: &mut ProbeReport,
    ) -> Option<String> {
        let renamed = MailboxName::new(&self.namespace, &self.second_name);
        let to = match renamed.transport_path() {
            Ok(path) => path,
            Err(e) => {
                report.record(
                    Step::Rename,
                    StepOutcome::Failed {
                        message: e.to_string(),
                        server_errors: Vec::new(),
                    },
                );
                return None;
            }
        };

        match session.rename_mailbox(from, &to).await {
            Ok(()) => {
                info!("Renamed {} to {}", from, to);
                report.record(
                    Step::Rename,
                    StepOutcome::passed(Some(StepDetail::Renamed {
                        from: from.to_string(),
                        to: to.clone(),
                    })),
                );
                Some(to)
            }
            Err(e) => {
                report.record(Step::Rename, failure(&e, session));
                None
            }
        }
    }

    async fn grant<S: MailSession>(
        &self,
        session: &mut S,
        path: &str,
        report: &mut ProbeReport,
    ) {
        match session
            .set_access(path, &self.principal, &self.rights)
            .await
        {
            Ok(()) => {
                info!("Granted '{}' rights '{}' on {}", self.principal, self.rights, path);
                report.record(
                    Step::SetAcl,
                    StepOutcome::passed(Some(StepDetail::Note(format!(
                        "granted '{}' rights '{}' on {path}",
                        self.principal, self.rights
                    )))),
                );
            }
            Err(e) => report.record(Step::SetAcl, failure(&e, session)),
        }
    }

    async fn cleanup<S: MailSession>(
        &self,
        session: &mut S,
        path: &str,
        report: &mut ProbeReport,
    ) {
        match session.delete_mailbox(path).await {
            Ok(()) => {
                info!("Removed mailbox {}", path);
                report.record(
                    Step::Delete,
                    StepOutcome::passed(Some(StepDetail::Note(format!("removed {path}")))),
                );
            }
            Err(e) => report.record(Step::Delete, failure(&e, session)),
        }
    }
}

/// Capture a step failure with the server's own messages preserved
/// verbatim.
fn failure<S: MailSession>(err: &Error, session: &S) -> StepOutcome {
    StepOutcome::Failed {
        message: err.to_string(),
        server_errors: session.all_errors(),
    }
}
