//! Block editor operations.
//!
//! Every operation borrows the current draft and returns a fresh one; the
//! input is never modified, so a rejected edit leaves the caller holding the
//! last good draft. Persistence and upload side effects are composed by the
//! caller (see `session`).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{BlockPayload, BlockType, ContentBlock, ContentItem, LessonDraft, LessonStatus};
use crate::error::EditError;

/// A single editable block field together with its new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum BlockField {
  Title(String),
  Description(String),
  IsActive(bool),
  HtmlContent(String),
  VideoUrl(String),
  RemedyId(String),
  ImageUrl(String),
  LinkUrl(String),
  AltText(String),
  PdfUrl(String),
}

impl BlockField {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Title(_) => "title",
      Self::Description(_) => "description",
      Self::IsActive(_) => "isActive",
      Self::HtmlContent(_) => "htmlContent",
      Self::VideoUrl(_) => "videoUrl",
      Self::RemedyId(_) => "remedyId",
      Self::ImageUrl(_) => "imageUrl",
      Self::LinkUrl(_) => "linkUrl",
      Self::AltText(_) => "altText",
      Self::PdfUrl(_) => "pdfUrl",
    }
  }
}

/// Where a field lives inside a block of a given type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldLocation {
  Block,
  Payload,
}

/// Static field → location map. `None` means the field does not exist on
/// blocks of that type.
pub fn field_location(block_type: BlockType, field: &BlockField) -> Option<FieldLocation> {
  use BlockField as F;
  use BlockType as T;
  match (block_type, field) {
    // video keeps its title in the payload; every other type has it on the block
    (T::Video, F::Title(_)) => Some(FieldLocation::Payload),
    (_, F::Title(_) | F::Description(_) | F::IsActive(_)) => Some(FieldLocation::Block),
    (T::Text, F::HtmlContent(_)) => Some(FieldLocation::Payload),
    (T::Video, F::VideoUrl(_)) => Some(FieldLocation::Payload),
    (T::Remedy, F::RemedyId(_)) => Some(FieldLocation::Payload),
    (T::Tip, F::ImageUrl(_) | F::HtmlContent(_) | F::AltText(_)) => Some(FieldLocation::Payload),
    (T::Image, F::ImageUrl(_) | F::LinkUrl(_) | F::AltText(_)) => Some(FieldLocation::Payload),
    (T::Pdf, F::PdfUrl(_)) => Some(FieldLocation::Payload),
    _ => None,
  }
}

/// Editable lesson-level fields. The course reference is deliberately absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum LessonField {
  Title(String),
  Description(String),
  Image(String),
  Status(LessonStatus),
}

/// Editable fields of a content item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ItemField {
  Title(String),
  ImageUrl(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  Up,
  Down,
}

fn invalid(index: usize, block_type: BlockType, operation: impl Into<String>) -> EditError {
  let operation = operation.into();
  warn!(target: "editor", index, %block_type, %operation, "Rejected invalid block operation");
  EditError::InvalidBlockOperation { index, block_type, operation }
}

fn check_block(draft: &LessonDraft, index: usize) -> Result<&ContentBlock, EditError> {
  draft.content_blocks.get(index).ok_or_else(|| {
    warn!(target: "editor", index, len = draft.content_blocks.len(), "Block index out of range");
    EditError::BlockOutOfRange { index, len: draft.content_blocks.len() }
  })
}

pub fn update_lesson_field(draft: &LessonDraft, field: LessonField) -> LessonDraft {
  let mut next = draft.clone();
  match field {
    LessonField::Title(v) => next.title = v,
    LessonField::Description(v) => next.description = v,
    LessonField::Image(v) => next.image = v,
    LessonField::Status(v) => next.status = v,
  }
  next
}

/// Append an empty block of `block_type`.
pub fn add_block(draft: &LessonDraft, block_type: BlockType) -> LessonDraft {
  let mut next = draft.clone();
  let order = next.content_blocks.len();
  next.content_blocks.push(ContentBlock::new(block_type, order));
  debug!(target: "editor", %block_type, order, "Block added");
  next
}

/// Replace one field of the block at `index`, routed to the block itself or
/// its payload according to [`field_location`].
pub fn update_block_field(draft: &LessonDraft, index: usize, field: BlockField) -> Result<LessonDraft, EditError> {
  let block_type = check_block(draft, index)?.block_type();
  let location = field_location(block_type, &field)
    .ok_or_else(|| invalid(index, block_type, format!("update of '{}'", field.name())))?;

  let mut next = draft.clone();
  let block = &mut next.content_blocks[index];
  match location {
    FieldLocation::Block => match field {
      BlockField::Title(v) => block.title = v,
      BlockField::Description(v) => block.description = v,
      BlockField::IsActive(v) => block.is_active = v,
      other => return Err(invalid(index, block_type, format!("update of '{}'", other.name()))),
    },
    FieldLocation::Payload => apply_payload_field(&mut block.payload, field)
      .map_err(|name| invalid(index, block_type, format!("update of '{}'", name)))?,
  }
  Ok(next)
}

fn apply_payload_field(payload: &mut BlockPayload, field: BlockField) -> Result<(), &'static str> {
  use BlockField as F;
  use BlockPayload as P;
  match (payload, field) {
    (P::Text(p), F::HtmlContent(v)) => p.html_content = v,
    (P::Video(p), F::VideoUrl(v)) => p.video_url = v,
    (P::Video(p), F::Title(v)) => p.title = v,
    (P::Remedy(p), F::RemedyId(v)) => p.remedy_id = v,
    (P::Tip(p), F::ImageUrl(v)) => p.image_url = v,
    (P::Tip(p), F::HtmlContent(v)) => p.html_content = v,
    (P::Tip(p), F::AltText(v)) => p.alt_text = v,
    (P::Image(p), F::ImageUrl(v)) => p.image_url = v,
    (P::Image(p), F::LinkUrl(v)) => p.link_url = v,
    (P::Image(p), F::AltText(v)) => p.alt_text = v,
    (P::Pdf(p), F::PdfUrl(v)) => p.pdf_url = v,
    (_, other) => return Err(other.name()),
  }
  Ok(())
}

pub fn remove_block(draft: &LessonDraft, index: usize) -> Result<LessonDraft, EditError> {
  check_block(draft, index)?;
  let mut next = draft.clone();
  let removed = next.content_blocks.remove(index);
  next.renumber();
  debug!(target: "editor", index, block_type = %removed.block_type(), "Block removed");
  Ok(next)
}

/// Swap the block with its neighbour. Moving past either end is a no-op.
pub fn move_block(draft: &LessonDraft, index: usize, direction: Direction) -> Result<LessonDraft, EditError> {
  check_block(draft, index)?;
  let mut next = draft.clone();
  if let Some(target) = neighbour(index, direction, next.content_blocks.len()) {
    next.content_blocks.swap(index, target);
  }
  next.renumber();
  Ok(next)
}

/// Index a block at `index` would swap with, if any.
pub fn neighbour(index: usize, direction: Direction, len: usize) -> Option<usize> {
  match direction {
    Direction::Up => index.checked_sub(1),
    Direction::Down => Some(index + 1).filter(|t| *t < len),
  }
}

fn items_mut<'a>(
  draft: &'a mut LessonDraft,
  index: usize,
  operation: &str,
) -> Result<&'a mut Vec<ContentItem>, EditError> {
  let len = draft.content_blocks.len();
  let block = draft
    .content_blocks
    .get_mut(index)
    .ok_or(EditError::BlockOutOfRange { index, len })?;
  let block_type = block.block_type();
  match &mut block.payload {
    BlockPayload::Content(c) => Ok(&mut c.items),
    _ => Err(invalid(index, block_type, operation)),
  }
}

pub fn add_item(draft: &LessonDraft, index: usize, item: ContentItem) -> Result<LessonDraft, EditError> {
  check_block(draft, index)?;
  let mut next = draft.clone();
  items_mut(&mut next, index, "add_item")?.push(item);
  Ok(next)
}

pub fn update_item(
  draft: &LessonDraft,
  index: usize,
  item_index: usize,
  field: ItemField,
) -> Result<LessonDraft, EditError> {
  check_block(draft, index)?;
  let mut next = draft.clone();
  let items = items_mut(&mut next, index, "update_item")?;
  let len = items.len();
  let item = items
    .get_mut(item_index)
    .ok_or(EditError::ItemOutOfRange { block: index, item: item_index, len })?;
  match field {
    ItemField::Title(v) => item.title = v,
    ItemField::ImageUrl(v) => item.image_url = v,
  }
  Ok(next)
}

pub fn remove_item(draft: &LessonDraft, index: usize, item_index: usize) -> Result<LessonDraft, EditError> {
  check_block(draft, index)?;
  let mut next = draft.clone();
  let items = items_mut(&mut next, index, "remove_item")?;
  if item_index >= items.len() {
    return Err(EditError::ItemOutOfRange { block: index, item: item_index, len: items.len() });
  }
  items.remove(item_index);
  Ok(next)
}
