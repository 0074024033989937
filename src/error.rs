use crate::domain::payload::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a dispatch job before any recipient is contacted.
///
/// Every variant renders as a single status line suitable for the progress sink.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Gateway credentials missing: set WA_PHONE_ID and WA_TOKEN")]
    Configuration,
    #[error("No valid recipients loaded; load a recipient file before sending")]
    EmptyRecipients,
    #[error("Image missing or unreadable: {}", .0.as_ref().map_or_else(|| "no image selected".to_string(), |p| p.display().to_string()))]
    MissingImage(Option<PathBuf>),
    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),
    #[error("Could not load recipients: {0}")]
    Ingestion(#[from] IngestionError),
    #[error("A dispatch job is already in progress")]
    JobInProgress,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of a recipient file load. None of these touch a running job.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("No phone column recognized; expected one of: {}", .expected.join(", "))]
    NoIdentifierColumn { expected: Vec<String> },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed delimited data: {0}")]
    Csv(#[from] csv::Error),
}
