//! Minimal client for the lesson/course/remedy API.
//!
//! We only need four calls: create, update and read a lesson, and list the
//! remedies selectable in `remedy` blocks. Calls are instrumented and log
//! status codes, latencies and ids (never payload contents or the token).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::util::extract_error_message;
use crate::wire::{LessonPayload, LessonRecord};

/// One selectable remedy. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemedyOption {
  #[serde(deserialize_with = "crate::wire::id_as_string")]
  pub id: String,
  #[serde(default)]
  pub title: String,
}

#[async_trait]
pub trait LessonStore: Send + Sync {
  /// Returns the id of the new lesson.
  async fn create_lesson(&self, payload: &LessonPayload) -> Result<String, ApiError>;
  async fn update_lesson(&self, id: &str, payload: &LessonPayload) -> Result<(), ApiError>;
  async fn get_lesson(&self, id: &str) -> Result<LessonRecord, ApiError>;
  async fn list_remedies(&self) -> Result<Vec<RemedyOption>, ApiError>;
}

#[derive(Clone)]
pub struct HttpLessonApi {
  client: reqwest::Client,
  base_url: String,
  token: Option<String>,
}

impl HttpLessonApi {
  pub fn new(cfg: &ApiConfig) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      token: cfg.token.clone(),
    })
  }

  fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
    let url = format!("{}{}", self.base_url, path);
    let req = self.client.request(method, url)
      .header(USER_AGENT, "lesson-author/0.1")
      .header(CONTENT_TYPE, "application/json");
    match &self.token {
      Some(token) => req.header(AUTHORIZATION, format!("Bearer {}", token)),
      None => req,
    }
  }

  /// Send, check status, and return the body as JSON (`Null` when empty).
  async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ApiError> {
    let start = Instant::now();
    let res = req.send().await?;
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !status.is_success() {
      error!(target: "lesson_author", %status, elapsed = ?start.elapsed(), "Lesson API returned an error status");
      return Err(ApiError::Status { status: status.as_u16(), message: extract_error_message(&body) });
    }
    info!(target: "lesson_author", %status, elapsed = ?start.elapsed(), body_len = body.len(), "Lesson API answered");
    if body.trim().is_empty() {
      return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
  }
}

/// Many backends wrap results as `{ "data": ... }`; accept both.
fn unwrap_data<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  let inner = match value {
    Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
    other => other,
  };
  Ok(serde_json::from_value(inner)?)
}

#[async_trait]
impl LessonStore for HttpLessonApi {
  #[instrument(level = "info", skip(self, payload), fields(course_id = %payload.course_id, blocks = payload.content_blocks.len()))]
  async fn create_lesson(&self, payload: &LessonPayload) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct Created {
      #[serde(deserialize_with = "crate::wire::id_as_string")]
      id: String,
    }
    let body = self.send(self.request(reqwest::Method::POST, "/lessons").json(payload)).await?;
    let created: Created = unwrap_data(body)
      .map_err(|_| ApiError::Malformed("create response carries no lesson id".into()))?;
    info!(target: "lesson_author", lesson_id = %created.id, "Lesson created");
    Ok(created.id)
  }

  #[instrument(level = "info", skip(self, payload), fields(%id, blocks = payload.content_blocks.len()))]
  async fn update_lesson(&self, id: &str, payload: &LessonPayload) -> Result<(), ApiError> {
    let path = format!("/lessons/{}", id);
    self.send(self.request(reqwest::Method::PUT, &path).json(payload)).await?;
    Ok(())
  }

  #[instrument(level = "info", skip(self), fields(%id))]
  async fn get_lesson(&self, id: &str) -> Result<LessonRecord, ApiError> {
    let path = format!("/lessons/{}", id);
    let body = self.send(self.request(reqwest::Method::GET, &path)).await?;
    unwrap_data(body)
  }

  #[instrument(level = "info", skip(self))]
  async fn list_remedies(&self) -> Result<Vec<RemedyOption>, ApiError> {
    let body = self.send(self.request(reqwest::Method::GET, "/remedies")).await?;
    unwrap_data(body)
  }
}
