//! Lifecycle outcome report
//!
//! A [`ProbeReport`] is the sole artifact a probe run produces: an
//! ordered list of step results, one per attempted pipeline step.
//! Skipped steps are not recorded. The report renders as an aligned
//! text table via [`fmt::Display`] and serializes to JSON for the
//! `--json` CLI flag.

use crate::mailbox::{ListingEntry, MailboxStatus};
use crate::utf7;
use serde::Serialize;
use std::fmt;

/// One step of the lifecycle pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Create,
    List,
    Status,
    Rename,
    SetAcl,
    Delete,
    Close,
}

impl Step {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Status => "status",
            Self::Rename => "rename",
            Self::SetAcl => "setacl",
            Self::Delete => "delete",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to a passed step.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StepDetail {
    /// Entries returned by the enumerate step.
    Listing(Vec<ListingEntry>),
    /// Snapshot returned by the status step.
    Status(MailboxStatus),
    /// Old and new transport paths after a rename.
    Renamed { from: String, to: String },
    /// Free-form note (target path, rights granted, ...).
    Note(String),
}

/// How one attempted step went.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The operation succeeded and its postcondition held.
    Passed {
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<StepDetail>,
    },
    /// The server rejected the operation. `message` is the step's own
    /// error; `server_errors` preserves every server-supplied
    /// error/warning verbatim.
    Failed {
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        server_errors: Vec<String>,
    },
    /// The operation succeeded but its result violated a
    /// postcondition (e.g. wrong listing cardinality). Never aborts
    /// the pipeline.
    Inconsistent { message: String },
}

impl StepOutcome {
    #[must_use]
    pub const fn passed(detail: Option<StepDetail>) -> Self {
        Self::Passed { detail }
    }

    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// A step paired with how it went.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Ordered record of every attempted step in one probe run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProbeReport {
    steps: Vec<StepResult>,
}

impl ProbeReport {
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepResult { step, outcome });
    }

    /// All recorded steps, in pipeline order.
    #[must_use]
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// The result for `step`, if it was attempted.
    #[must_use]
    pub fn step(&self, step: Step) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// Whether every attempted step passed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|r| r.outcome.is_passed())
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.steps {
            let (verdict, detail) = match &result.outcome {
                StepOutcome::Passed { detail } => {
                    ("ok", detail.as_ref().map_or_else(String::new, render_detail))
                }
                StepOutcome::Failed {
                    message,
                    server_errors,
                } => {
                    let mut text = message.clone();
                    for err in server_errors {
                        text.push_str("; ");
                        text.push_str(err);
                    }
                    ("failed", text)
                }
                StepOutcome::Inconsistent { message } => ("mismatch", message.clone()),
            };
            writeln!(f, "{:<8} {:<8} {}", result.step.as_str(), verdict, detail)?;
        }
        Ok(())
    }
}

fn render_detail(detail: &StepDetail) -> String {
    match detail {
        StepDetail::Listing(entries) => {
            let names: Vec<String> = entries
                .iter()
                .map(|e| utf7::decode(&e.name).unwrap_or_else(|_| e.name.clone()))
                .collect();
            format!("{} entry(ies): {}", entries.len(), names.join(", "))
        }
        StepDetail::Status(status) => status.to_string(),
        StepDetail::Renamed { from, to } => format!("{from} -> {to}"),
        StepDetail::Note(note) => note.clone(),
    }
}
