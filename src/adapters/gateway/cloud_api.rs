use super::{GatewayError, MessageGateway, SendReceipt};
use crate::config::{Credentials, GatewayConfig};
use crate::domain::recipient::Recipient;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

/// WhatsApp Business Cloud API client.
///
/// Images are uploaded once per distinct path and then referenced by media id
/// for every recipient.
#[derive(Debug)]
pub struct CloudApiGateway {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    credentials: Credentials,
    media_ids: Mutex<HashMap<PathBuf, String>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct MediaUploadResponse {
    id: String,
}

impl CloudApiGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig, credentials: Credentials) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            credentials,
            media_ids: Mutex::new(HashMap::new()),
        })
    }

    fn phone_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.api_version, self.credentials.phone_id, endpoint)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body).map_or(body, |b| b.error.message);
            return Err(GatewayError::Api { status: status.as_u16(), message });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn post_message(&self, payload: &Value) -> Result<SendReceipt, GatewayError> {
        let resp = self
            .client
            .post(self.phone_url("messages"))
            .bearer_auth(&self.credentials.token)
            .json(payload)
            .send()
            .await?;
        Self::decode(resp).await
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn upload_media(&self, path: &Path) -> Result<String, GatewayError> {
        let mime = image_mime_type(path)?;
        let data = tokio::fs::read(path).await.map_err(|source| GatewayError::Media { path: path.to_path_buf(), source })?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();

        let part = Part::bytes(data).file_name(file_name).mime_str(mime)?;
        let form = Form::new().text("messaging_product", "whatsapp").text("type", mime).part("file", part);

        let resp = self
            .client
            .post(self.phone_url("media"))
            .bearer_auth(&self.credentials.token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: MediaUploadResponse = Self::decode(resp).await?;

        tracing::info!(media_id = %uploaded.id, "Uploaded image");
        Ok(uploaded.id)
    }

    async fn media_id(&self, path: &Path) -> Result<String, GatewayError> {
        let mut cache = self.media_ids.lock().await;
        if let Some(id) = cache.get(path) {
            return Ok(id.clone());
        }
        let id = self.upload_media(path).await?;
        cache.insert(path.to_path_buf(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl MessageGateway for CloudApiGateway {
    #[tracing::instrument(level = "debug", skip(self, to, body), fields(to = %to))]
    async fn send_text(&self, to: &Recipient, body: &str) -> Result<SendReceipt, GatewayError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to.as_str(),
            "type": "text",
            "text": { "preview_url": false, "body": body },
        });
        self.post_message(&payload).await
    }

    #[tracing::instrument(level = "debug", skip(self, to, image, caption), fields(to = %to, image = %image.display()))]
    async fn send_image(
        &self,
        to: &Recipient,
        image: &Path,
        caption: Option<&str>,
    ) -> Result<SendReceipt, GatewayError> {
        let media_id = self.media_id(image).await?;

        let mut image_obj = json!({ "id": media_id });
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            image_obj["caption"] = json!(caption);
        }

        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to.as_str(),
            "type": "image",
            "image": image_obj,
        });
        self.post_message(&payload).await
    }
}

/// The Cloud API accepts JPEG and PNG images.
fn image_mime_type(path: &Path) -> Result<&'static str, GatewayError> {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        _ => Err(GatewayError::UnsupportedMedia(path.display().to_string())),
    }
}
