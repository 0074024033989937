use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Placeholder shown in an empty message box; submitting it unchanged is rejected.
pub const TEXT_PLACEHOLDER: &str = "Type your message here...";

pub const DEFAULT_MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    Image,
}

/// Content delivered to every recipient of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text { body: String },
    Image { path: PathBuf, caption: Option<String> },
}

impl Payload {
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Text { .. } => PayloadKind::Text,
            Self::Image { .. } => PayloadKind::Image,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty; type a message before sending")]
    EmptyMessage,
    #[error("message is {len} characters long, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },
}

/// Content rules applied before a job is admitted.
#[derive(Debug, Clone)]
pub struct PayloadRules {
    pub max_len: usize,
    pub placeholder: String,
}

impl Default for PayloadRules {
    fn default() -> Self {
        Self { max_len: DEFAULT_MAX_MESSAGE_LEN, placeholder: TEXT_PLACEHOLDER.to_string() }
    }
}

impl PayloadRules {
    #[must_use]
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len, ..Self::default() }
    }

    /// Checks `content` for a payload of `kind`. Length is counted in characters
    /// after trimming surrounding whitespace.
    ///
    /// Text bodies must be non-empty and differ from the placeholder. Captions
    /// may be empty; only the length ceiling applies to them.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyMessage`] or [`ValidationError::MessageTooLong`].
    pub fn validate(&self, kind: PayloadKind, content: &str) -> Result<(), ValidationError> {
        let content = content.trim();

        if kind == PayloadKind::Text && (content.is_empty() || content == self.placeholder.trim()) {
            return Err(ValidationError::EmptyMessage);
        }

        let len = content.chars().count();
        if len > self.max_len {
            return Err(ValidationError::MessageTooLong { len, max: self.max_len });
        }

        Ok(())
    }
}
