use crate::config::TelemetryConfig;
use crate::execution::rest_client::{RestClient, RestRequest};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends notifications to a Telegram chat.
///
/// Every call is best effort: failures are logged and swallowed so a broken
/// bot never stops a trading run. Without credentials messages only go to
/// the log.
pub struct AlertManager {
    config: TelemetryConfig,
    client: RestClient,
    api_base: String,
}

impl AlertManager {
    pub fn new(config: TelemetryConfig, client: RestClient) -> Self {
        Self {
            config,
            client,
            api_base: TELEGRAM_API.into(),
        }
    }

    /// Point at another Bot API host.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.config.telegram_bot_token, &self.config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Ok((token.as_str(), chat_id.as_str())),
            _ => anyhow::bail!("Telegram credentials not configured"),
        }
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{token}/{method}", self.api_base.trim_end_matches('/'))
    }

    /// Send a text message.
    pub async fn send(&self, message: &str) {
        info!("ALERT: {message}");

        if !self.is_configured() {
            return;
        }
        if let Err(e) = self.send_message(message).await {
            error!("Failed to send Telegram message: {e:#}");
        }
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let (token, chat_id) = self.credentials()?;
        let req = RestRequest::post(self.method_url(token, "sendMessage")).json(serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        }));
        self.client.send(&req).await?;
        Ok(())
    }

    /// Upload a file as a document.
    pub async fn send_document(&self, path: &Path, caption: &str) {
        if let Err(e) = self.upload("sendDocument", "document", path, caption).await {
            error!(path = %path.display(), "Failed to send Telegram document: {e:#}");
        }
    }

    /// Upload an image.
    pub async fn send_photo(&self, path: &Path, caption: &str) {
        if let Err(e) = self.upload("sendPhoto", "photo", path, caption).await {
            error!(path = %path.display(), "Failed to send Telegram photo: {e:#}");
        }
    }

    async fn upload(&self, method: &str, field: &str, path: &Path, caption: &str) -> Result<()> {
        let (token, chat_id) = self.credentials()?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("File not found: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| field.to_string());

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(field.to_string(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let resp = self
            .client
            .http()
            .post(self.method_url(token, method))
            .timeout(self.client.timeout())
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram {method} returned HTTP {status}: {body}");
        }
        Ok(())
    }

    /// Alert on order placement.
    pub async fn on_trade(&self, summary: &str) {
        if self.config.alert_on_trade {
            self.send(&format!("Trade: {summary}")).await;
        }
    }

    /// Alert on error.
    pub async fn on_error(&self, error: &str) {
        if self.config.alert_on_error {
            self.send(&format!("⚠️ Error: {error}")).await;
        }
    }
}
