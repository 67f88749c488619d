//! Step validation and wizard navigation.
//!
//! Each step's required fields are declared once in [`validate_step`]; the
//! controller never skips it on the way forward.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{BlockPayload, ContentBlock, LessonDraft};
use crate::error::ValidationError;
use crate::util::is_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
  BasicInformation,
  ContentBlocks,
  ReviewAndSubmit,
}

impl WizardStep {
  pub const ALL: [WizardStep; 3] = [
    WizardStep::BasicInformation,
    WizardStep::ContentBlocks,
    WizardStep::ReviewAndSubmit,
  ];

  pub fn from_index(i: usize) -> Option<Self> {
    Self::ALL.get(i).copied()
  }

  pub fn index(&self) -> usize {
    match self {
      Self::BasicInformation => 0,
      Self::ContentBlocks => 1,
      Self::ReviewAndSubmit => 2,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::BasicInformation => "Basic Information",
      Self::ContentBlocks => "Content Blocks",
      Self::ReviewAndSubmit => "Review & Submit",
    }
  }
}

pub const LAST_STEP: usize = WizardStep::ALL.len() - 1;

/// Result of validating one step against a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
  pub ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

impl StepOutcome {
  pub fn pass() -> Self {
    Self { ok: true, message: None }
  }

  pub fn fail(message: impl Into<String>) -> Self {
    Self { ok: false, message: Some(message.into()) }
  }

  pub fn into_result(self) -> Result<(), ValidationError> {
    match self {
      Self { ok: true, .. } => Ok(()),
      Self { message, .. } => Err(ValidationError::StepIncomplete(
        message.unwrap_or_else(|| "This step is incomplete".into()),
      )),
    }
  }
}

/// Pure check of `step` against `draft`. Out-of-range steps have no
/// constraints.
pub fn validate_step(step: usize, draft: &LessonDraft) -> StepOutcome {
  match WizardStep::from_index(step) {
    Some(WizardStep::BasicInformation) => validate_basic(draft),
    Some(WizardStep::ContentBlocks) => validate_blocks(draft),
    Some(WizardStep::ReviewAndSubmit) | None => StepOutcome::pass(),
  }
}

fn validate_basic(draft: &LessonDraft) -> StepOutcome {
  if is_blank(&draft.title) {
    return StepOutcome::fail("Lesson title is required");
  }
  if is_blank(&draft.description) {
    return StepOutcome::fail("Lesson description is required");
  }
  if is_blank(&draft.image) {
    return StepOutcome::fail("Lesson image must be uploaded before continuing");
  }
  StepOutcome::pass()
}

fn validate_blocks(draft: &LessonDraft) -> StepOutcome {
  if draft.content_blocks.is_empty() {
    return StepOutcome::fail("Add at least one content block");
  }
  for (i, block) in draft.content_blocks.iter().enumerate() {
    if let Some(problem) = block_problem(block) {
      return StepOutcome::fail(format!("Block {} ({}): {}", i, block.block_type(), problem));
    }
  }
  StepOutcome::pass()
}

/// First missing required field of a block, if any.
pub fn block_problem(block: &ContentBlock) -> Option<String> {
  let missing = |name: &str| Some(format!("{name} is required"));
  match &block.payload {
    BlockPayload::Text(p) if is_blank(&p.html_content) => missing("content"),
    BlockPayload::Video(p) if is_blank(&p.video_url) => missing("video URL"),
    BlockPayload::Remedy(p) if is_blank(&p.remedy_id) => missing("remedy"),
    BlockPayload::Tip(p) if is_blank(&p.html_content) => missing("tip content"),
    BlockPayload::Image(p) if is_blank(&p.image_url) => missing("image"),
    BlockPayload::Pdf(p) if is_blank(&p.pdf_url) => missing("PDF"),
    BlockPayload::Content(c) if c.items.is_empty() => Some("at least one item is required".into()),
    BlockPayload::Content(c) => c
      .items
      .iter()
      .position(|item| is_blank(&item.title))
      .map(|i| format!("item {i} is missing a title")),
    _ => None,
  }
}

/// Tracks the current step and which steps have been passed going forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WizardController {
  current: usize,
  completed: BTreeSet<usize>,
}

impl WizardController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn current(&self) -> usize {
    self.current
  }

  pub fn current_step(&self) -> WizardStep {
    WizardStep::from_index(self.current).unwrap_or(WizardStep::ReviewAndSubmit)
  }

  pub fn completed(&self) -> &BTreeSet<usize> {
    &self.completed
  }

  pub fn is_completed(&self, step: usize) -> bool {
    self.completed.contains(&step)
  }

  /// Validate the current step and advance. On failure nothing changes and
  /// the diagnostic is returned.
  pub fn next(&mut self, draft: &LessonDraft) -> Result<usize, ValidationError> {
    if self.current >= LAST_STEP {
      return Ok(self.current);
    }
    validate_step(self.current, draft).into_result().map_err(|e| {
      debug!(target: "wizard", step = self.current, error = %e, "Forward navigation blocked");
      e
    })?;
    self.completed.insert(self.current);
    self.current += 1;
    info!(target: "wizard", step = self.current, "Advanced to step");
    Ok(self.current)
  }

  pub fn previous(&mut self) -> usize {
    self.current = self.current.saturating_sub(1);
    self.current
  }

  /// Jump to an earlier step, or to a step already passed.
  pub fn go_to(&mut self, step: usize) -> Result<usize, ValidationError> {
    if step > LAST_STEP || (step > self.current && !self.completed.contains(&step)) {
      return Err(ValidationError::StepNotReachable { step });
    }
    self.current = step;
    Ok(self.current)
  }

  pub fn can_submit(&self) -> bool {
    self.current == LAST_STEP
  }
}
