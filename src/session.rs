//! One author's editing session: the draft, its upload registry and the
//! wizard, kept consistent with each other.
//!
//! The draft is only ever replaced, never edited in place. Uploaded URLs
//! reach it solely through [`EditingSession::resolve_upload`], which routes
//! them through the same editor operations as manual edits.

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{BlockType, ContentItem, LessonDraft};
use crate::editor::{self, BlockField, Direction, ItemField, LessonField};
use crate::error::{AuthoringError, EditError, SubmissionError, UploadError, ValidationError};
use crate::lesson_api::LessonStore;
use crate::upload::{BlockAsset, ItemAsset, SelectedFile, UploadAddress, UploadRegistry, UploadStatus, UploadTicket};
use crate::wire::{self, LessonRecord};
use crate::wizard::{self, StepOutcome, WizardController};

/// Apply `url` to the draft field named by `address`.
pub fn commit_address(draft: &LessonDraft, address: &UploadAddress, url: &str) -> Result<LessonDraft, EditError> {
  match *address {
    UploadAddress::LessonCover => Ok(editor::update_lesson_field(draft, LessonField::Image(url.to_string()))),
    UploadAddress::Block { block, field: BlockAsset::ImageUrl } => {
      editor::update_block_field(draft, block, BlockField::ImageUrl(url.to_string()))
    }
    UploadAddress::Block { block, field: BlockAsset::PdfUrl } => {
      editor::update_block_field(draft, block, BlockField::PdfUrl(url.to_string()))
    }
    UploadAddress::Item { block, item, field: ItemAsset::ImageUrl } => {
      editor::update_item(draft, block, item, ItemField::ImageUrl(url.to_string()))
    }
  }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
  pub lesson_id: String,
  pub created: bool,
}

#[derive(Debug)]
pub struct EditingSession {
  id: String,
  draft: LessonDraft,
  uploads: UploadRegistry,
  wizard: WizardController,
  discarded: bool,
}

impl EditingSession {
  pub fn new(course_id: impl Into<String>, max_upload_bytes: usize) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      draft: LessonDraft::new(course_id),
      uploads: UploadRegistry::new(max_upload_bytes),
      wizard: WizardController::new(),
      discarded: false,
    }
  }

  /// Edit mode: rebuild the draft from a stored lesson and restore preview
  /// state for every asset it already references.
  pub fn from_record(record: LessonRecord, max_upload_bytes: usize) -> Result<Self, AuthoringError> {
    let (draft, assets) = wire::from_record(record)?;
    let mut uploads = UploadRegistry::new(max_upload_bytes);
    for (address, url) in assets {
      uploads.restore(address, url);
    }
    info!(target: "lesson_author", lesson_id = ?draft.lesson_id, blocks = draft.content_blocks.len(), "Session opened in edit mode");
    Ok(Self {
      id: Uuid::new_v4().to_string(),
      draft,
      uploads,
      wizard: WizardController::new(),
      discarded: false,
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn draft(&self) -> &LessonDraft {
    &self.draft
  }

  pub fn uploads(&self) -> &UploadRegistry {
    &self.uploads
  }

  pub fn wizard(&self) -> &WizardController {
    &self.wizard
  }

  pub fn is_discarded(&self) -> bool {
    self.discarded
  }

  fn ensure_open(&self) -> Result<(), AuthoringError> {
    if self.discarded {
      return Err(AuthoringError::Discarded);
    }
    Ok(())
  }

  /// Swap in the result of an editor operation. On error the current draft
  /// stays as it was.
  fn replace(&mut self, next: Result<LessonDraft, EditError>) -> Result<&LessonDraft, AuthoringError> {
    self.ensure_open()?;
    self.draft = next?;
    Ok(&self.draft)
  }

  // --- editor operations ---

  pub fn update_lesson_field(&mut self, field: LessonField) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::update_lesson_field(&self.draft, field);
    self.replace(Ok(next))
  }

  pub fn add_block(&mut self, block_type: BlockType) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::add_block(&self.draft, block_type);
    self.replace(Ok(next))
  }

  pub fn update_block_field(&mut self, index: usize, field: BlockField) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::update_block_field(&self.draft, index, field);
    self.replace(next)
  }

  pub fn remove_block(&mut self, index: usize) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::remove_block(&self.draft, index);
    self.replace(next)?;
    self.uploads.remove_block(index);
    Ok(&self.draft)
  }

  pub fn move_block(&mut self, index: usize, direction: Direction) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::move_block(&self.draft, index, direction);
    self.replace(next)?;
    if let Some(target) = editor::neighbour(index, direction, self.draft.content_blocks.len()) {
      self.uploads.swap_blocks(index, target);
    }
    Ok(&self.draft)
  }

  pub fn add_item(&mut self, index: usize, item: ContentItem) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::add_item(&self.draft, index, item);
    self.replace(next)
  }

  pub fn update_item(&mut self, index: usize, item: usize, field: ItemField) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::update_item(&self.draft, index, item, field);
    self.replace(next)
  }

  pub fn remove_item(&mut self, index: usize, item: usize) -> Result<&LessonDraft, AuthoringError> {
    let next = editor::remove_item(&self.draft, index, item);
    self.replace(next)?;
    self.uploads.remove_item(index, item);
    Ok(&self.draft)
  }

  // --- uploads ---

  pub fn mark_dragging(&mut self, address: UploadAddress) -> Result<(), AuthoringError> {
    self.ensure_open()?;
    commit_address(&self.draft, &address, "")?;
    self.uploads.mark_dragging(address);
    Ok(())
  }

  pub fn cancel_dragging(&mut self, address: &UploadAddress) {
    self.uploads.cancel_dragging(address);
  }

  /// Validate the file and the target field, record a local preview and hand
  /// back the ticket the network step runs with. No network happens here.
  pub fn begin_upload(&mut self, address: UploadAddress, file: SelectedFile) -> Result<UploadTicket, AuthoringError> {
    self.ensure_open()?;
    // dry run: the address must name a field this draft actually has
    commit_address(&self.draft, &address, "")?;
    Ok(self.uploads.begin(address, file)?)
  }

  /// Apply the network result of upload `seq`. Stale or post-discard results
  /// are ignored and return `Ok(None)`.
  #[instrument(level = "debug", skip(self, result), fields(session = %self.id, ok = result.is_ok()))]
  pub fn resolve_upload(
    &mut self,
    seq: u64,
    result: Result<String, UploadError>,
  ) -> Result<Option<UploadAddress>, AuthoringError> {
    if self.discarded {
      return Ok(None);
    }
    match result {
      Ok(url) => {
        let draft = &mut self.draft;
        let committed = self.uploads.complete(seq, url, |address, url| {
          *draft = commit_address(draft, address, url)?;
          Ok::<(), EditError>(())
        })?;
        Ok(committed)
      }
      Err(e) => match self.uploads.fail(seq, e.to_string()) {
        Some(_) => Err(e.into()),
        None => Ok(None),
      },
    }
  }

  /// Author removed an asset without replacing it: forget the task and empty
  /// the field.
  pub fn clear_asset(&mut self, address: &UploadAddress) -> Result<&LessonDraft, AuthoringError> {
    let next = commit_address(&self.draft, address, "");
    self.replace(next)?;
    self.uploads.clear(address);
    Ok(&self.draft)
  }

  // --- wizard ---

  pub fn validate_current(&self) -> StepOutcome {
    wizard::validate_step(self.wizard.current(), &self.draft)
  }

  pub fn next_step(&mut self) -> Result<usize, AuthoringError> {
    self.ensure_open()?;
    Ok(self.wizard.next(&self.draft)?)
  }

  pub fn previous_step(&mut self) -> usize {
    self.wizard.previous()
  }

  pub fn go_to_step(&mut self, step: usize) -> Result<usize, AuthoringError> {
    Ok(self.wizard.go_to(step)?)
  }

  /// Everything that must hold before the persistence call is made.
  fn check_submittable(&self) -> Result<(), AuthoringError> {
    self.ensure_open()?;
    if !self.wizard.can_submit() {
      return Err(ValidationError::NotAtFinalStep.into());
    }
    for step in 0..wizard::LAST_STEP {
      wizard::validate_step(step, &self.draft).into_result()?;
    }
    Ok(())
  }

  /// Persist the draft. Creates the lesson the first time, updates it after.
  /// The draft is untouched on failure so the author can retry.
  #[instrument(level = "info", skip(self, store), fields(session = %self.id, lesson_id = ?self.draft.lesson_id))]
  pub async fn submit(&mut self, store: &dyn LessonStore) -> Result<Submitted, AuthoringError> {
    self.check_submittable()?;
    let in_flight = self.uploads.in_flight();
    if in_flight > 0 {
      warn!(target: "lesson_author", in_flight, "Submitting while uploads are still outstanding");
    }
    let payload = wire::to_payload(&self.draft).map_err(|e| {
      error!(target: "lesson_author", error = %e, "Draft could not be serialized");
      SubmissionError { message: SubmissionError::FALLBACK_MESSAGE.into() }
    })?;

    let result = match &self.draft.lesson_id {
      Some(id) => store.update_lesson(id, &payload).await.map(|_| (id.clone(), false)),
      None => store.create_lesson(&payload).await.map(|id| (id, true)),
    };
    match result {
      Ok((lesson_id, created)) => {
        info!(target: "lesson_author", %lesson_id, created, "Lesson saved");
        self.draft.lesson_id = Some(lesson_id.clone());
        Ok(Submitted { lesson_id, created })
      }
      Err(e) => {
        error!(target: "lesson_author", error = %e, "Lesson submission failed");
        Err(SubmissionError::from_api(&e).into())
      }
    }
  }

  /// End the session: release every preview and make any upload still in
  /// flight a no-op when it returns.
  pub fn discard(&mut self) {
    if self.discarded {
      return;
    }
    self.uploads.close();
    self.discarded = true;
    info!(target: "lesson_author", session = %self.id, "Session discarded");
  }

  /// Status of the task at `address`, if any.
  pub fn upload_status(&self, address: &UploadAddress) -> Option<UploadStatus> {
    self.uploads.get(address).map(|t| t.status)
  }
}

impl Drop for EditingSession {
  fn drop(&mut self) {
    self.uploads.close();
  }
}
