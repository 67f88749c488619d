//! Small utility helpers used across modules.

use serde::Deserialize;

/// True if the string is empty or whitespace only.
/// All "required" checks on authored fields go through this.
pub fn is_blank(s: &str) -> bool {
  s.trim().is_empty()
}

/// Try to pull a human-readable message out of a collaborator error body.
/// Accepts `{ "message": ... }` and `{ "error": { "message": ... } }`, and
/// falls back to a short plain-text body.
pub fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct Flat { message: String }
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }

  if let Ok(f) = serde_json::from_str::<Flat>(body) {
    return Some(f.message);
  }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  let text = body.trim();
  if text.is_empty() || text.starts_with('{') || text.starts_with('<') {
    None
  } else {
    Some(trunc_for_log(text, 200))
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
