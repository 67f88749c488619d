//! Error taxonomy for the authoring engine.
//!
//! Every failing operation leaves the lesson draft in its last known-good
//! state; these types only describe what went wrong.

use thiserror::Error;

use crate::domain::{BlockType, UnknownBlockType};

/// Client-side rejection that never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{file} is not a supported file type: expected {expected}, got '{found}'")]
  UnsupportedMediaType {
    file: String,
    expected: &'static str,
    found: String,
  },

  #[error("{file} is too large: {size} bytes (limit {limit} bytes)")]
  FileTooLarge { file: String, size: usize, limit: usize },

  #[error("{file} could not be read")]
  UnreadableFile { file: String },

  #[error("unknown block type '{0}'")]
  UnknownBlockType(String),

  /// A wizard step's required fields are missing.
  #[error("{0}")]
  StepIncomplete(String),

  #[error("submission is only available from the final step")]
  NotAtFinalStep,

  #[error("step {step} cannot be reached yet")]
  StepNotReachable { step: usize },
}

impl From<UnknownBlockType> for ValidationError {
  fn from(e: UnknownBlockType) -> Self {
    Self::UnknownBlockType(e.0)
  }
}

/// Failure of the remote asset upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
  /// The collaborator answered but refused the file.
  #[error("{message}")]
  Rejected { message: String },

  #[error("upload failed: {0}")]
  Transport(String),

  #[error("upload timed out after {secs}s")]
  TimedOut { secs: u64 },
}

/// Misuse of a block editor operation. The draft is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
  #[error("{operation} is not valid for block {index} of type '{block_type}'")]
  InvalidBlockOperation {
    index: usize,
    block_type: BlockType,
    operation: String,
  },

  #[error("block index {index} is out of range ({len} blocks)")]
  BlockOutOfRange { index: usize, len: usize },

  #[error("item index {item} is out of range for block {block} ({len} items)")]
  ItemOutOfRange { block: usize, item: usize, len: usize },
}

/// The final persistence call failed; the draft is retained for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionError {
  pub message: String,
}

impl SubmissionError {
  pub const FALLBACK_MESSAGE: &'static str = "Failed to save lesson";

  pub fn from_api(err: &ApiError) -> Self {
    let message = match err {
      ApiError::Status { message: Some(m), .. } if !m.trim().is_empty() => m.clone(),
      _ => Self::FALLBACK_MESSAGE.to_string(),
    };
    Self { message }
  }
}

/// Errors from the HTTP collaborator clients.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API error ({status}): {}", message.as_deref().unwrap_or("no message"))]
  Status { status: u16, message: Option<String> },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  /// The collaborator sent something the engine cannot map into a draft.
  #[error("malformed lesson record: {0}")]
  Malformed(String),
}

/// Umbrella error used by the session and service layers.
#[derive(Debug, Error)]
pub enum AuthoringError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Upload(#[from] UploadError),

  #[error(transparent)]
  Edit(#[from] EditError),

  #[error(transparent)]
  Submission(#[from] SubmissionError),

  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("unknown session '{0}'")]
  UnknownSession(String),

  #[error("session has been discarded")]
  Discarded,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn submission_error_prefers_collaborator_message() {
    let err = ApiError::Status { status: 422, message: Some("Title already taken".into()) };
    assert_eq!(SubmissionError::from_api(&err).message, "Title already taken");

    let err = ApiError::Status { status: 500, message: None };
    assert_eq!(SubmissionError::from_api(&err).message, SubmissionError::FALLBACK_MESSAGE);
  }
}
