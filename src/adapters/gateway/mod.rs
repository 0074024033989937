use crate::domain::recipient::Recipient;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod cloud_api;

pub use cloud_api::CloudApiGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to read media {}: {source}", path.display())]
    Media {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported image type: {0}")]
    UnsupportedMedia(String),
    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

/// Body returned by the gateway for an accepted message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendReceipt {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: Option<String>,
}

impl SendReceipt {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { messages: vec![SentMessage { id: Some(id.into()) }] }
    }

    /// Id of the first accepted message, if the gateway returned one.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().and_then(|m| m.id.as_deref())
    }
}

#[async_trait]
pub trait MessageGateway: Send + Sync + std::fmt::Debug {
    /// Sends a plain text message to `to`.
    ///
    /// # Errors
    /// Returns a `GatewayError` for transport failures and rejected requests.
    async fn send_text(&self, to: &Recipient, body: &str) -> Result<SendReceipt, GatewayError>;

    /// Sends the image at `image` to `to`, with `caption` shown beneath it when present.
    ///
    /// # Errors
    /// Returns a `GatewayError` when the image cannot be read or uploaded, or the send is rejected.
    async fn send_image(&self, to: &Recipient, image: &Path, caption: Option<&str>)
    -> Result<SendReceipt, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_reads_first_message_id() {
        let receipt: SendReceipt =
            serde_json::from_str(r#"{"messaging_product":"whatsapp","messages":[{"id":"wamid.A"},{"id":"wamid.B"}]}"#)
                .expect("valid receipt");
        assert_eq!(receipt.message_id(), Some("wamid.A"));
    }

    #[test]
    fn test_receipt_without_messages() {
        let receipt: SendReceipt = serde_json::from_str(r#"{"messaging_product":"whatsapp"}"#).expect("valid");
        assert_eq!(receipt.message_id(), None);

        let receipt: SendReceipt = serde_json::from_str(r#"{"messages":[{}]}"#).expect("valid");
        assert_eq!(receipt.message_id(), None);
    }
}
