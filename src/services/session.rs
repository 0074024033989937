use crate::domain::payload::PayloadKind;
use crate::domain::recipient::Recipient;
use crate::error::IngestionError;
use crate::services::dispatch_service::JobRequest;
use crate::services::ingest_service::{LoadedRecipients, RecipientReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file was chosen; the previous recipient set is untouched.
    Cancelled,
    Loaded { file_name: String, count: usize, skipped: usize },
}

impl LoadOutcome {
    #[must_use]
    pub fn status_line(&self) -> String {
        match self {
            Self::Cancelled => "no file selected".to_string(),
            Self::Loaded { file_name, count, .. } => format!("file loaded: {file_name} ({count} recipients)"),
        }
    }
}

/// Foreground state between loads and job submission.
///
/// Jobs never read this directly: [`Session::job_request`] hands them a copy.
#[derive(Debug)]
pub struct Session {
    reader: RecipientReader,
    recipients: Vec<Recipient>,
    source_file: Option<String>,
    image: Option<PathBuf>,
}

impl Session {
    #[must_use]
    pub const fn new(reader: RecipientReader) -> Self {
        Self { reader, recipients: Vec::new(), source_file: None, image: None }
    }

    /// Loads recipients from `path`, replacing the current set on success and
    /// clearing it on failure. `None` means the selection was cancelled.
    ///
    /// # Errors
    /// Propagates the `IngestionError` that aborted the load.
    pub fn load_recipients(&mut self, path: Option<&Path>, delimiter: &str) -> Result<LoadOutcome, IngestionError> {
        let Some(path) = path else {
            tracing::warn!("Recipient file selection cancelled");
            return Ok(LoadOutcome::Cancelled);
        };

        match self.reader.read_file(path, delimiter) {
            Ok(LoadedRecipients { recipients, file_name, skipped, .. }) => {
                let count = recipients.len();
                self.recipients = recipients;
                self.source_file = Some(file_name.clone());
                Ok(LoadOutcome::Loaded { file_name, count, skipped })
            }
            Err(e) => {
                self.recipients.clear();
                self.source_file = None;
                Err(e)
            }
        }
    }

    /// Sets the image for image jobs; `None` clears the selection.
    pub fn select_image(&mut self, path: Option<PathBuf>) {
        match &path {
            Some(p) => tracing::info!(image = %p.display(), "Image selected"),
            None => tracing::info!("Image selection cleared"),
        }
        self.image = path;
    }

    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    #[must_use]
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    /// Snapshots the current state into a request for the dispatcher.
    #[must_use]
    pub fn job_request(&self, kind: PayloadKind, content: impl Into<String>) -> JobRequest {
        JobRequest {
            recipients: self.recipients.clone(),
            kind,
            content: content.into(),
            image: if kind == PayloadKind::Image { self.image.clone() } else { None },
        }
    }
}
