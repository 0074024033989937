use crate::adapters::gateway::MessageGateway;
use crate::config::DispatchConfig;
use crate::domain::dispatch::{DispatchJob, DispatchOutcome, DispatchReport, JobState, ProgressEvent};
use crate::domain::payload::{Payload, PayloadKind, PayloadRules};
use crate::domain::recipient::Recipient;
use crate::error::{AppError, Result};
use crate::services::progress::ProgressSink;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    failed: Counter<u64>,
    rejected: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mass-dispatch");
        Self {
            sent: meter
                .u64_counter("dispatch_sent_total")
                .with_description("Total number of messages accepted by the gateway")
                .build(),
            failed: meter
                .u64_counter("dispatch_failed_total")
                .with_description("Total number of per-recipient delivery failures")
                .build(),
            rejected: meter
                .u64_counter("dispatch_jobs_rejected_total")
                .with_description("Total number of jobs refused before sending")
                .build(),
        }
    }
}

/// Everything a job needs, captured from the foreground at submit time.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub recipients: Vec<Recipient>,
    pub kind: PayloadKind,
    pub content: String,
    pub image: Option<PathBuf>,
}

/// Handle to a job running on its background task.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    total: usize,
    task: JoinHandle<DispatchReport>,
}

impl JobHandle {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Waits for the send loop to finish.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the background task panicked.
    pub async fn wait(self) -> Result<DispatchReport> {
        self.task.await.map_err(|e| AppError::Internal(format!("dispatch task failed: {e}")))
    }
}

/// Gates and runs dispatch jobs, one at a time.
#[derive(Debug)]
pub struct Dispatcher {
    gateway: Option<Arc<dyn MessageGateway>>,
    rules: PayloadRules,
    send_delay: Duration,
    slot: Arc<Semaphore>,
    state: Arc<watch::Sender<JobState>>,
    metrics: Metrics,
}

impl Dispatcher {
    /// `gateway` is `None` when credentials are not configured; every job is
    /// then refused with `AppError::Configuration`.
    #[must_use]
    pub fn new(gateway: Option<Arc<dyn MessageGateway>>, config: &DispatchConfig) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            gateway,
            rules: PayloadRules::with_max_len(config.max_message_len),
            send_delay: config.send_delay(),
            slot: Arc::new(Semaphore::new(1)),
            state: Arc::new(state),
            metrics: Metrics::new(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: PayloadRules) -> Self {
        self.rules = rules;
        self
    }

    /// Observes the state of the most recent job.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Runs the preflight checks in order: credentials, recipients, image
    /// (image jobs only), then content. Nothing is sent.
    ///
    /// # Errors
    /// Returns the first check that fails.
    pub fn preflight(&self, request: JobRequest) -> Result<DispatchJob> {
        if self.gateway.is_none() {
            return Err(AppError::Configuration);
        }

        if request.recipients.is_empty() {
            return Err(AppError::EmptyRecipients);
        }

        if request.kind == PayloadKind::Image {
            match &request.image {
                Some(path) if path.is_file() => {}
                other => return Err(AppError::MissingImage(other.clone())),
            }
        }

        self.rules.validate(request.kind, &request.content)?;

        let content = request.content.trim().to_string();
        let payload = match (request.kind, request.image) {
            (PayloadKind::Text, _) => Payload::Text { body: content },
            (PayloadKind::Image, Some(path)) => {
                Payload::Image { path, caption: (!content.is_empty()).then_some(content) }
            }
            (PayloadKind::Image, None) => return Err(AppError::MissingImage(None)),
        };

        Ok(DispatchJob::new(request.recipients, payload))
    }

    /// Admits a job and starts sending on a background task.
    ///
    /// A refusal is reported to `sink` as a single status line before it is
    /// returned, and no recipient is contacted.
    ///
    /// # Errors
    /// Returns `AppError::JobInProgress` while another job is sending, or the
    /// preflight error that refused this one.
    pub fn start(&self, request: JobRequest, sink: Arc<dyn ProgressSink>) -> Result<JobHandle> {
        let admitted = Arc::clone(&self.slot)
            .try_acquire_owned()
            .map_err(|_| AppError::JobInProgress)
            .and_then(|permit| {
                self.state.send_replace(JobState::Idle);
                self.preflight(request).map(|job| (permit, job))
            });

        let (permit, job) = match admitted {
            Ok(admitted) => admitted,
            Err(e) => {
                if !matches!(e, AppError::JobInProgress) {
                    self.state.send_replace(JobState::PreflightFailed);
                }
                tracing::error!(error = %e, "Dispatch job refused");
                self.metrics.rejected.add(1, &[]);
                sink.emit(ProgressEvent::Status(e.to_string()));
                return Err(e);
            }
        };

        let Some(gateway) = self.gateway.as_ref().map(Arc::clone) else {
            return Err(AppError::Configuration);
        };

        let id = job.id;
        let total = job.recipients.len();
        let kind = job.payload.kind();
        tracing::info!(job_id = %id, ?kind, total, "Starting dispatch job");

        self.state.send_replace(JobState::Sending);
        let span = tracing::info_span!("dispatch_job", job_id = %id, ?kind, total);
        let task = tokio::spawn(
            run_job(job, gateway, sink, self.send_delay, self.metrics.clone(), Arc::clone(&self.state), permit)
                .instrument(span),
        );

        Ok(JobHandle { id, total, task })
    }
}

async fn run_job(
    mut job: DispatchJob,
    gateway: Arc<dyn MessageGateway>,
    sink: Arc<dyn ProgressSink>,
    send_delay: Duration,
    metrics: Metrics,
    state: Arc<watch::Sender<JobState>>,
    permit: OwnedSemaphorePermit,
) -> DispatchReport {
    let total = job.recipients.len();
    let kind_attr = [KeyValue::new("kind", if job.payload.kind() == PayloadKind::Image { "image" } else { "text" })];

    for index in 0..total {
        if index > 0 && !send_delay.is_zero() {
            tokio::time::sleep(send_delay).await;
        }

        let recipient = job.recipients[index].clone();
        sink.emit(ProgressEvent::Step { index: index + 1, total, recipient: recipient.clone() });

        let result = match &job.payload {
            Payload::Text { body } => gateway.send_text(&recipient, body).await,
            Payload::Image { path, caption } => gateway.send_image(&recipient, path, caption.as_deref()).await,
        };

        let outcome = match result {
            Ok(receipt) => {
                let message_id = receipt.message_id().map(str::to_string);
                tracing::info!(recipient = %recipient, message_id = ?message_id, "Message sent");
                metrics.sent.add(1, &kind_attr);
                DispatchOutcome::sent(recipient, message_id)
            }
            Err(e) => {
                tracing::error!(recipient = %recipient, error = %e, "Failed to send message");
                metrics.failed.add(1, &kind_attr);
                DispatchOutcome::failed(recipient, e.to_string())
            }
        };
        job.record(outcome);
    }

    let report = job.finish();
    tracing::info!(
        succeeded = report.summary.succeeded,
        failed = report.summary.failed,
        "{}",
        report.summary.status_line()
    );
    // The slot is free before the host hears the job is done
    state.send_replace(JobState::Completed);
    drop(permit);
    sink.emit(ProgressEvent::Finished(report.summary));
    report
}
