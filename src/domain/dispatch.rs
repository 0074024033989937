use crate::domain::payload::{Payload, PayloadKind};
use crate::domain::recipient::Recipient;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Message id recorded when the gateway accepted a send but returned no id.
pub const MESSAGE_ID_UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub recipient: Recipient,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    #[must_use]
    pub fn sent(recipient: Recipient, provider_message_id: Option<String>) -> Self {
        Self {
            recipient,
            status: DeliveryStatus::Sent,
            provider_message_id: Some(provider_message_id.unwrap_or_else(|| MESSAGE_ID_UNAVAILABLE.to_string())),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(recipient: Recipient, error: String) -> Self {
        Self { recipient, status: DeliveryStatus::Failed, provider_message_id: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[DispatchOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.status == DeliveryStatus::Sent).count();
        Self { total: outcomes.len(), succeeded, failed: outcomes.len() - succeeded }
    }

    /// Final status line shown to the operator.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("done. succeeded: {}, failed: {}", self.succeeded, self.failed)
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

/// Lifecycle of a job as observed through the dispatcher.
/// `PreflightFailed` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    PreflightFailed,
    Sending,
    Completed,
}

/// A recipient snapshot bound to one payload, admitted by preflight.
///
/// The job owns its recipients, so reloading the source file while it runs
/// cannot change what it sends.
#[derive(Debug)]
pub struct DispatchJob {
    pub id: Uuid,
    pub recipients: Vec<Recipient>,
    pub payload: Payload,
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchJob {
    #[must_use]
    pub fn new(recipients: Vec<Recipient>, payload: Payload) -> Self {
        let outcomes = Vec::with_capacity(recipients.len());
        Self { id: Uuid::new_v4(), recipients, payload, outcomes }
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.outcomes.len()
    }

    /// Records the outcome for the next recipient in order.
    pub fn record(&mut self, outcome: DispatchOutcome) {
        debug_assert_eq!(self.recipients.get(self.outcomes.len()), Some(&outcome.recipient));
        self.outcomes.push(outcome);
    }

    /// Consumes the job, producing its report.
    #[must_use]
    pub fn finish(self) -> DispatchReport {
        let summary = DispatchSummary::from_outcomes(&self.outcomes);
        DispatchReport { job_id: self.id, kind: self.payload.kind(), summary, outcomes: self.outcomes }
    }
}

/// Everything that survives a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub job_id: Uuid,
    pub kind: PayloadKind,
    pub summary: DispatchSummary,
    pub outcomes: Vec<DispatchOutcome>,
}

/// Signals a job emits to whoever is displaying its progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A standalone status line, e.g. a preflight rejection.
    Status(String),
    /// Emitted before the gateway call for the `index`-th recipient (1-based).
    Step { index: usize, total: usize, recipient: Recipient },
    Finished(DispatchSummary),
}

impl ProgressEvent {
    /// Fraction of the job completed, when the event carries one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Status(_) => None,
            Self::Step { index, total, .. } => Some(*index as f64 / *total as f64),
            Self::Finished(_) => Some(1.0),
        }
    }

    #[must_use]
    pub fn status_line(&self) -> String {
        match self {
            Self::Status(line) => line.clone(),
            Self::Step { index, total, recipient } => format!("sending ({index}/{total}): {recipient}"),
            Self::Finished(summary) => summary.status_line(),
        }
    }
}
