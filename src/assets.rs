//! Client for the remote image/PDF upload endpoint.
//!
//! The endpoint takes one multipart `file` part and answers
//! `{ "success": bool, "url"?: string, "message"?: string }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::config::UploadConfig;
use crate::error::{ApiError, UploadError};
use crate::upload::{SelectedFile, UploadTicket};
use crate::util::extract_error_message;

/// Progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
  #[serde(default)] pub success: bool,
  #[serde(default)] pub url: Option<String>,
  #[serde(default)] pub message: Option<String>,
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
  async fn upload(&self, file: &SelectedFile, progress: Option<&ProgressFn>) -> Result<UploadResponse, ApiError>;
}

#[derive(Clone)]
pub struct HttpAssetUploader {
  client: reqwest::Client,
  endpoint: String,
  token: Option<String>,
}

impl HttpAssetUploader {
  pub fn new(cfg: &UploadConfig, token: Option<String>) -> Result<Self, ApiError> {
    // The overall deadline is enforced by `perform_upload`; this only bounds
    // connection setup.
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { client, endpoint: cfg.endpoint.clone(), token })
  }
}

#[async_trait]
impl AssetUploader for HttpAssetUploader {
  #[instrument(level = "info", skip(self, file, progress), fields(file = %file.name, mime = %file.mime, len = file.bytes.len()))]
  async fn upload(&self, file: &SelectedFile, progress: Option<&ProgressFn>) -> Result<UploadResponse, ApiError> {
    let total = file.bytes.len() as u64;
    let part = Part::bytes(file.bytes.clone())
      .file_name(file.name.clone())
      .mime_str(&file.mime)?;
    let form = Form::new().part("file", part);

    let mut req = self.client.post(&self.endpoint)
      .header(USER_AGENT, "lesson-author/0.1")
      .multipart(form);
    if let Some(token) = &self.token {
      req = req.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    let start = std::time::Instant::now();
    let res = req.send().await?;
    if let Some(report) = progress {
      report(total, total);
    }

    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !status.is_success() {
      let message = extract_error_message(&body);
      error!(target: "upload", %status, elapsed = ?start.elapsed(), "Upload endpoint returned an error status");
      return Err(ApiError::Status { status: status.as_u16(), message });
    }

    let parsed: UploadResponse = serde_json::from_str(&body)?;
    info!(target: "upload", elapsed = ?start.elapsed(), success = parsed.success, "Upload endpoint answered");
    Ok(parsed)
  }
}

/// Run the network half of an upload with a hard deadline. Expiry, transport
/// errors and refusals all come back as `UploadError`; only a successful
/// response carrying a URL yields `Ok`.
#[instrument(level = "info", skip(uploader, ticket, progress), fields(address = %ticket.address, seq = ticket.seq))]
pub async fn perform_upload(
  uploader: &dyn AssetUploader,
  ticket: &UploadTicket,
  timeout: Duration,
  progress: Option<&ProgressFn>,
) -> Result<String, UploadError> {
  let call = uploader.upload(&ticket.file, progress);
  let res = match tokio::time::timeout(timeout, call).await {
    Ok(res) => res,
    Err(_) => return Err(UploadError::TimedOut { secs: timeout.as_secs() }),
  };
  match res {
    Ok(UploadResponse { success: true, url: Some(url), .. }) if !url.trim().is_empty() => Ok(url),
    Ok(UploadResponse { message, .. }) => Err(UploadError::Rejected {
      message: message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Upload failed".to_string()),
    }),
    Err(ApiError::Status { message: Some(message), .. }) => Err(UploadError::Rejected { message }),
    Err(e) => Err(UploadError::Transport(e.to_string())),
  }
}
