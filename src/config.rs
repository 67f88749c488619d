//! Loading service configuration (collaborator endpoints + upload limits) from TOML.
//!
//! The file is optional; every field has a default, and a few environment
//! variables override the file:
//!   PORT                : u16 (default 3000)
//!   LESSON_API_BASE_URL : base URL of the lesson/course/remedy API
//!   LESSON_API_TOKEN    : bearer token sent to both collaborators
//!   UPLOAD_ENDPOINT     : full URL of the image/PDF upload endpoint

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::upload::DEFAULT_MAX_BYTES;

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct AuthorConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub upload: UploadConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
  #[serde(default = "default_port")]
  pub port: u16,
  /// Sessions untouched for this long are discarded. 0 keeps them until
  /// they are deleted explicitly.
  #[serde(default = "default_session_idle")]
  pub session_idle_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { port: default_port(), session_idle_secs: default_session_idle() }
  }
}

impl ServerConfig {
  pub fn session_idle(&self) -> Option<Duration> {
    (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
  }
}

/// Lesson persistence, lesson read and remedy lookup all live behind one API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiConfig {
  #[serde(default = "default_api_base")]
  pub base_url: String,
  #[serde(default)]
  pub token: Option<String>,
  #[serde(default = "default_api_timeout")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self { base_url: default_api_base(), token: None, timeout_secs: default_api_timeout() }
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UploadConfig {
  #[serde(default = "default_upload_endpoint")]
  pub endpoint: String,
  #[serde(default = "default_max_bytes")]
  pub max_bytes: usize,
  /// Hard deadline for one upload; expiry is treated as a failed upload.
  #[serde(default = "default_upload_timeout")]
  pub timeout_secs: u64,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self {
      endpoint: default_upload_endpoint(),
      max_bytes: default_max_bytes(),
      timeout_secs: default_upload_timeout(),
    }
  }
}

impl UploadConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_port() -> u16 { 3000 }
fn default_session_idle() -> u64 { 3600 }
fn default_api_base() -> String { "http://localhost:8000/api".into() }
fn default_api_timeout() -> u64 { 20 }
fn default_upload_endpoint() -> String { "http://localhost:8000/api/upload".into() }
fn default_max_bytes() -> usize { DEFAULT_MAX_BYTES }
fn default_upload_timeout() -> u64 { 45 }

impl AuthorConfig {
  /// Parse a TOML document.
  pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }

  /// Apply environment overrides on top of the loaded values.
  pub fn with_env_overrides(mut self) -> Self {
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
      self.server.port = port;
    }
    if let Ok(base) = std::env::var("LESSON_API_BASE_URL") {
      self.api.base_url = base;
    }
    if let Ok(token) = std::env::var("LESSON_API_TOKEN") {
      self.api.token = Some(token).filter(|t| !t.is_empty());
    }
    if let Ok(endpoint) = std::env::var("UPLOAD_ENDPOINT") {
      self.upload.endpoint = endpoint;
    }
    self
  }
}

/// Load `AuthorConfig` from AUTHOR_CONFIG_PATH, falling back to defaults on
/// any IO/parse error, then apply environment overrides.
pub fn load_author_config_from_env() -> AuthorConfig {
  let from_file = std::env::var("AUTHOR_CONFIG_PATH").ok().and_then(|path| {
    match std::fs::read_to_string(&path) {
      Ok(s) => match AuthorConfig::from_toml(&s) {
        Ok(cfg) => {
          info!(target: "lesson_author", %path, "Loaded author config (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "lesson_author", %path, error = %e, "Failed to parse TOML config");
          None
        }
      },
      Err(e) => {
        error!(target: "lesson_author", %path, error = %e, "Failed to read TOML config file");
        None
      }
    }
  });
  from_file.unwrap_or_default().with_env_overrides()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg = AuthorConfig::from_toml(
      r#"
        [upload]
        endpoint = "https://cdn.example.com/upload"
        timeout_secs = 30
      "#,
    )
    .unwrap();
    assert_eq!(cfg.upload.endpoint, "https://cdn.example.com/upload");
    assert_eq!(cfg.upload.timeout(), Duration::from_secs(30));
    assert_eq!(cfg.upload.max_bytes, 5 * 1024 * 1024);
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.session_idle(), Some(Duration::from_secs(3600)));
    assert_eq!(cfg.api, ApiConfig::default());
  }

  #[test]
  fn zero_idle_disables_eviction() {
    let cfg = AuthorConfig::from_toml("[server]\nsession_idle_secs = 0\n").unwrap();
    assert_eq!(cfg.server.session_idle(), None);
  }
}
