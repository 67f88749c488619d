//! Mapping between the in-memory draft and the lesson API's wire shape.
//!
//! Outbound, each block becomes `{ type, order, content }` where `content`
//! holds the payload fields plus `isActive` and, when set, the block's
//! `title`/`description`. Inbound, a stored lesson is turned back into a draft
//! and the list of already committed asset URLs, so upload previews can be
//! restored for edit mode.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{
  BlockPayload, BlockType, ContentBlock, ContentPayload, ImagePayload, LessonDraft, LessonStatus, PdfPayload,
  RemedyPayload, TextPayload, TipPayload, VideoPayload,
};
use crate::error::ApiError;
use crate::upload::{BlockAsset, ItemAsset, UploadAddress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBlock {
  #[serde(rename = "type")]
  pub block_type: String,
  #[serde(default)]
  pub order: usize,
  #[serde(default)]
  pub content: Map<String, Value>,
}

/// Body of create/update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPayload {
  #[serde(deserialize_with = "id_as_string")]
  pub course_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub image: String,
  #[serde(default)]
  pub status: LessonStatus,
  #[serde(default, alias = "contentBlocks")]
  pub content_blocks: Vec<WireBlock>,
}

/// A stored lesson as returned by the read collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LessonRecord {
  #[serde(deserialize_with = "id_as_string")]
  pub id: String,
  #[serde(flatten)]
  pub lesson: LessonPayload,
}

/// Backends disagree on whether ids are numbers or strings; keep them opaque.
pub(crate) fn id_as_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  match Value::deserialize(d)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
  }
}

fn payload_content(payload: &BlockPayload) -> Result<Map<String, Value>, serde_json::Error> {
  let value = match payload {
    BlockPayload::Text(p) => serde_json::to_value(p)?,
    BlockPayload::Video(p) => serde_json::to_value(p)?,
    BlockPayload::Remedy(p) => serde_json::to_value(p)?,
    BlockPayload::Tip(p) => serde_json::to_value(p)?,
    BlockPayload::Image(p) => serde_json::to_value(p)?,
    BlockPayload::Pdf(p) => serde_json::to_value(p)?,
    BlockPayload::Content(p) => serde_json::to_value(p)?,
  };
  match value {
    Value::Object(map) => Ok(map),
    _ => Ok(Map::new()),
  }
}

pub fn to_wire_block(block: &ContentBlock) -> Result<WireBlock, serde_json::Error> {
  let mut content = payload_content(&block.payload)?;
  content.insert("isActive".into(), Value::Bool(block.is_active));
  // a payload-level title (video) wins over the block metadata
  if !block.title.trim().is_empty() && !content.contains_key("title") {
    content.insert("title".into(), Value::String(block.title.clone()));
  }
  if !block.description.trim().is_empty() {
    content.insert("description".into(), Value::String(block.description.clone()));
  }
  Ok(WireBlock { block_type: block.block_type().as_str().to_string(), order: block.order, content })
}

/// Serialize the draft for the persistence collaborator. Order is taken from
/// position, not from the stored `order` field.
pub fn to_payload(draft: &LessonDraft) -> Result<LessonPayload, serde_json::Error> {
  let content_blocks = draft
    .content_blocks
    .iter()
    .enumerate()
    .map(|(i, b)| to_wire_block(b).map(|w| WireBlock { order: i, ..w }))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(LessonPayload {
    course_id: draft.course_id().to_string(),
    title: draft.title.clone(),
    description: draft.description.clone(),
    image: draft.image.clone(),
    status: draft.status.clone(),
    content_blocks,
  })
}

fn str_field(content: &Map<String, Value>, key: &str) -> String {
  content.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn from_wire_block(wire: &WireBlock, order: usize) -> Result<ContentBlock, ApiError> {
  let block_type: BlockType = wire
    .block_type
    .parse()
    .map_err(|e: crate::domain::UnknownBlockType| ApiError::Malformed(e.to_string()))?;
  let content = Value::Object(wire.content.clone());
  let payload = match block_type {
    BlockType::Text => BlockPayload::Text(serde_json::from_value::<TextPayload>(content)?),
    BlockType::Video => BlockPayload::Video(serde_json::from_value::<VideoPayload>(content)?),
    BlockType::Remedy => BlockPayload::Remedy(serde_json::from_value::<RemedyPayload>(content)?),
    BlockType::Tip => BlockPayload::Tip(serde_json::from_value::<TipPayload>(content)?),
    BlockType::Image => BlockPayload::Image(serde_json::from_value::<ImagePayload>(content)?),
    BlockType::Pdf => BlockPayload::Pdf(serde_json::from_value::<PdfPayload>(content)?),
    BlockType::Content => BlockPayload::Content(serde_json::from_value::<ContentPayload>(content)?),
  };
  let title = match block_type {
    BlockType::Video => String::new(),
    _ => str_field(&wire.content, "title"),
  };
  Ok(ContentBlock {
    title,
    description: str_field(&wire.content, "description"),
    is_active: wire.content.get("isActive").and_then(Value::as_bool).unwrap_or(true),
    order,
    payload,
  })
}

/// Addresses that already hold a committed asset in `draft`.
pub fn committed_assets(draft: &LessonDraft) -> Vec<(UploadAddress, String)> {
  let mut out = Vec::new();
  let mut push = |address: UploadAddress, url: &str| {
    if !url.trim().is_empty() {
      out.push((address, url.to_string()));
    }
  };
  push(UploadAddress::LessonCover, &draft.image);
  for (block, b) in draft.content_blocks.iter().enumerate() {
    match &b.payload {
      BlockPayload::Tip(TipPayload { image_url, .. }) | BlockPayload::Image(ImagePayload { image_url, .. }) => {
        push(UploadAddress::Block { block, field: BlockAsset::ImageUrl }, image_url)
      }
      BlockPayload::Pdf(p) => push(UploadAddress::Block { block, field: BlockAsset::PdfUrl }, &p.pdf_url),
      BlockPayload::Content(c) => {
        for (item, it) in c.items.iter().enumerate() {
          push(UploadAddress::Item { block, item, field: ItemAsset::ImageUrl }, &it.image_url);
        }
      }
      _ => {}
    }
  }
  out
}

/// Turn a stored lesson into a draft plus its committed asset URLs.
pub fn from_record(record: LessonRecord) -> Result<(LessonDraft, Vec<(UploadAddress, String)>), ApiError> {
  let LessonRecord { id, lesson } = record;
  let mut wire = lesson.content_blocks;
  wire.sort_by_key(|b| b.order);

  let mut content_blocks = Vec::with_capacity(wire.len());
  for (i, w) in wire.iter().enumerate() {
    match from_wire_block(w, i) {
      Ok(block) => content_blocks.push(block),
      Err(e) => {
        warn!(target: "lesson_author", lesson_id = %id, index = i, error = %e, "Stored block could not be mapped");
        return Err(e);
      }
    }
  }

  let mut draft = LessonDraft::new(lesson.course_id);
  draft.lesson_id = Some(id);
  draft.title = lesson.title;
  draft.description = lesson.description;
  draft.image = lesson.image;
  draft.status = lesson.status;
  draft.content_blocks = content_blocks;
  let assets = committed_assets(&draft);
  Ok((draft, assets))
}
