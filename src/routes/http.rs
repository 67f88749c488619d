//! HTTP endpoint handlers. These are thin wrappers that forward to the session.
//! Each handler is instrumented; edits answer with the full session view so
//! the editing surface can re-render from one response.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, instrument, warn};

use crate::domain::BlockType;
use crate::editor::{BlockField, ItemField, LessonField};
use crate::error::{AuthoringError, ValidationError};
use crate::protocol::*;
use crate::state::AppState;
use crate::upload::SelectedFile;

impl IntoResponse for AuthoringError {
  fn into_response(self) -> Response {
    let status = match &self {
      AuthoringError::Validation(_) | AuthoringError::Edit(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AuthoringError::Upload(_) | AuthoringError::Submission(_) | AuthoringError::Api(_) => StatusCode::BAD_GATEWAY,
      AuthoringError::UnknownSession(_) => StatusCode::NOT_FOUND,
      AuthoringError::Discarded => StatusCode::GONE,
    };
    if status.is_server_error() {
      warn!(target: "lesson_author", %status, error = %self, "Request failed");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

type SessionResult = Result<Json<SessionOut>, AuthoringError>;

/// Run `edit` against the locked session and answer with its new view.
async fn with_session<F>(state: &AppState, id: &str, edit: F) -> SessionResult
where
  F: FnOnce(&mut crate::session::EditingSession) -> Result<(), AuthoringError>,
{
  let shared = state.session(id).await?;
  let mut session = shared.lock().await;
  edit(&mut session)?;
  Ok(Json(to_out(&session)))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_remedies(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AuthoringError> {
  let remedies = state.lessons.list_remedies().await?;
  info!(target: "lesson_author", count = remedies.len(), "Remedies served");
  Ok(Json(remedies))
}

#[instrument(level = "info", skip(state))]
pub async fn http_open_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NewSessionIn>,
) -> Result<impl IntoResponse, AuthoringError> {
  let shared = match (body.lesson_id, body.course_id) {
    (Some(lesson_id), _) => state.open_existing(&lesson_id).await?.1,
    (None, Some(course_id)) if !course_id.trim().is_empty() => state.open_session(&course_id).await.1,
    _ => {
      return Err(ValidationError::StepIncomplete("courseId or lessonId is required".into()).into());
    }
  };
  let session = shared.lock().await;
  Ok((StatusCode::CREATED, Json(to_out(&session))))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> SessionResult {
  with_session(&state, &id, |_| Ok(())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_discard_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, AuthoringError> {
  state.discard(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, field))]
pub async fn http_patch_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(field): Json<LessonField>,
) -> SessionResult {
  with_session(&state, &id, |s| s.update_lesson_field(field).map(|_| ())).await
}

#[instrument(level = "info", skip(state), fields(block_type = %body.block_type))]
pub async fn http_add_block(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AddBlockIn>,
) -> SessionResult {
  // unknown types are rejected here, before the editor sees them
  let block_type: BlockType = body.block_type.parse().map_err(ValidationError::from)?;
  with_session(&state, &id, |s| s.add_block(block_type).map(|_| ())).await
}

#[instrument(level = "info", skip(state, field), fields(field = field.name()))]
pub async fn http_patch_block(
  State(state): State<Arc<AppState>>,
  Path((id, block)): Path<(String, usize)>,
  Json(field): Json<BlockField>,
) -> SessionResult {
  with_session(&state, &id, |s| s.update_block_field(block, field).map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_remove_block(
  State(state): State<Arc<AppState>>,
  Path((id, block)): Path<(String, usize)>,
) -> SessionResult {
  with_session(&state, &id, |s| s.remove_block(block).map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_move_block(
  State(state): State<Arc<AppState>>,
  Path((id, block)): Path<(String, usize)>,
  Json(body): Json<MoveIn>,
) -> SessionResult {
  with_session(&state, &id, |s| s.move_block(block, body.direction).map(|_| ())).await
}

#[instrument(level = "info", skip(state, item))]
pub async fn http_add_item(
  State(state): State<Arc<AppState>>,
  Path((id, block)): Path<(String, usize)>,
  Json(item): Json<AddItemIn>,
) -> SessionResult {
  with_session(&state, &id, |s| s.add_item(block, item).map(|_| ())).await
}

#[instrument(level = "info", skip(state, field))]
pub async fn http_patch_item(
  State(state): State<Arc<AppState>>,
  Path((id, block, item)): Path<(String, usize, usize)>,
  Json(field): Json<ItemField>,
) -> SessionResult {
  with_session(&state, &id, |s| s.update_item(block, item, field).map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_remove_item(
  State(state): State<Arc<AppState>>,
  Path((id, block, item)): Path<(String, usize, usize)>,
) -> SessionResult {
  with_session(&state, &id, |s| s.remove_item(block, item).map(|_| ())).await
}

#[instrument(level = "info", skip(state, body), fields(address = %body.address, file = %body.file_name, mime = %body.mime))]
pub async fn http_begin_upload(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<UploadIn>,
) -> Result<impl IntoResponse, AuthoringError> {
  let bytes = STANDARD
    .decode(body.data_base64.as_bytes())
    .map_err(|_| ValidationError::UnreadableFile { file: body.file_name.clone() })?;
  let file = SelectedFile { name: body.file_name, mime: body.mime, bytes };
  let seq = state.begin_upload(&id, body.address, file).await?;
  info!(target: "upload", session = %id, seq, "Upload accepted");

  let shared = state.session(&id).await?;
  let session = shared.lock().await;
  Ok((StatusCode::ACCEPTED, Json(to_out(&session))))
}

#[instrument(level = "info", skip(state, body), fields(address = %body.address, active = body.active))]
pub async fn http_drag_upload(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<DragIn>,
) -> SessionResult {
  with_session(&state, &id, |s| {
    if body.active {
      s.mark_dragging(body.address)
    } else {
      s.cancel_dragging(&body.address);
      Ok(())
    }
  })
  .await
}

#[instrument(level = "info", skip(state, body), fields(address = %body.address))]
pub async fn http_clear_upload(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AddressIn>,
) -> SessionResult {
  with_session(&state, &id, |s| s.clear_asset(&body.address).map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_wizard_next(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> SessionResult {
  with_session(&state, &id, |s| s.next_step().map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_wizard_previous(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> SessionResult {
  with_session(&state, &id, |s| {
    s.previous_step();
    Ok(())
  })
  .await
}

#[instrument(level = "info", skip(state))]
pub async fn http_wizard_goto(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<GoToIn>,
) -> SessionResult {
  with_session(&state, &id, |s| s.go_to_step(body.step).map(|_| ())).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SubmitOut>, AuthoringError> {
  let shared = state.session(&id).await?;
  let mut session = shared.lock().await;
  let submitted = session.submit(state.lessons.as_ref()).await?;
  info!(target: "lesson_author", session = %id, lesson_id = %submitted.lesson_id, created = submitted.created, "HTTP submit done");
  Ok(Json(SubmitOut { lesson_id: submitted.lesson_id, created: submitted.created }))
}
