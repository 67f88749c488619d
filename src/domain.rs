//! Domain models for lesson authoring: the draft document, its typed content
//! blocks, and the items nested inside `content` blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Publication status of a lesson. Statuses the engine does not know about
/// are kept verbatim so a stored lesson still loads and saves unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LessonStatus {
  #[default]
  Active,
  Inactive,
  Other(String),
}

impl LessonStatus {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Active => "active",
      Self::Inactive => "inactive",
      Self::Other(s) => s,
    }
  }
}

impl From<&str> for LessonStatus {
  fn from(s: &str) -> Self {
    match s {
      "active" => Self::Active,
      "inactive" => Self::Inactive,
      other => Self::Other(other.to_string()),
    }
  }
}

impl fmt::Display for LessonStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for LessonStatus {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for LessonStatus {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(Self::from(raw.as_str()))
  }
}

/// The seven kinds of content block an author can place in a lesson.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
  Text,
  Video,
  Remedy,
  Tip,
  Image,
  Pdf,
  Content,
}

impl BlockType {
  pub const ALL: [BlockType; 7] = [
    BlockType::Text,
    BlockType::Video,
    BlockType::Remedy,
    BlockType::Tip,
    BlockType::Image,
    BlockType::Pdf,
    BlockType::Content,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Text => "text",
      Self::Video => "video",
      Self::Remedy => "remedy",
      Self::Tip => "tip",
      Self::Image => "image",
      Self::Pdf => "pdf",
      Self::Content => "content",
    }
  }
}

impl fmt::Display for BlockType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when a block type string is not one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown block type '{0}'")]
pub struct UnknownBlockType(pub String);

impl FromStr for BlockType {
  type Err = UnknownBlockType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    BlockType::ALL
      .iter()
      .copied()
      .find(|t| t.as_str() == s)
      .ok_or_else(|| UnknownBlockType(s.to_string()))
  }
}

/// One entry of a `content` block (an ingredient, a step, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
  #[serde(default)] pub title: String,
  #[serde(default)] pub image_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextPayload {
  pub html_content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoPayload {
  pub video_url: String,
  pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemedyPayload {
  pub remedy_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TipPayload {
  pub image_url: String,
  pub html_content: String,
  pub alt_text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImagePayload {
  pub image_url: String,
  pub link_url: String,
  pub alt_text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfPayload {
  pub pdf_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPayload {
  pub items: Vec<ContentItem>,
}

/// Type-specific block payload. The variant *is* the block type, so a payload
/// can never carry fields that belong to another type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BlockPayload {
  Text(TextPayload),
  Video(VideoPayload),
  Remedy(RemedyPayload),
  Tip(TipPayload),
  Image(ImagePayload),
  Pdf(PdfPayload),
  Content(ContentPayload),
}

impl BlockPayload {
  /// Empty payload for a freshly added block.
  pub fn empty(block_type: BlockType) -> Self {
    match block_type {
      BlockType::Text => Self::Text(TextPayload::default()),
      BlockType::Video => Self::Video(VideoPayload::default()),
      BlockType::Remedy => Self::Remedy(RemedyPayload::default()),
      BlockType::Tip => Self::Tip(TipPayload::default()),
      BlockType::Image => Self::Image(ImagePayload::default()),
      BlockType::Pdf => Self::Pdf(PdfPayload::default()),
      BlockType::Content => Self::Content(ContentPayload::default()),
    }
  }

  pub fn block_type(&self) -> BlockType {
    match self {
      Self::Text(_) => BlockType::Text,
      Self::Video(_) => BlockType::Video,
      Self::Remedy(_) => BlockType::Remedy,
      Self::Tip(_) => BlockType::Tip,
      Self::Image(_) => BlockType::Image,
      Self::Pdf(_) => BlockType::Pdf,
      Self::Content(_) => BlockType::Content,
    }
  }
}

/// One authoring unit of a lesson.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  pub is_active: bool,
  /// Position in the lesson; re-derived on every structural edit.
  pub order: usize,
  #[serde(flatten)]
  pub payload: BlockPayload,
}

impl ContentBlock {
  pub fn new(block_type: BlockType, order: usize) -> Self {
    Self {
      title: String::new(),
      description: String::new(),
      is_active: true,
      order,
      payload: BlockPayload::empty(block_type),
    }
  }

  pub fn block_type(&self) -> BlockType {
    self.payload.block_type()
  }

  /// Items of a `content` block; `None` for every other type.
  pub fn items(&self) -> Option<&[ContentItem]> {
    match &self.payload {
      BlockPayload::Content(c) => Some(&c.items),
      _ => None,
    }
  }
}

/// The lesson document being authored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
  course_id: String,
  /// Set in edit mode, or once the lesson has been created remotely.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lesson_id: Option<String>,
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  /// Committed remote URL of the cover image, or empty.
  #[serde(default)] pub image: String,
  #[serde(default)] pub status: LessonStatus,
  #[serde(default)] pub content_blocks: Vec<ContentBlock>,
}

impl LessonDraft {
  pub fn new(course_id: impl Into<String>) -> Self {
    Self {
      course_id: course_id.into(),
      lesson_id: None,
      title: String::new(),
      description: String::new(),
      image: String::new(),
      status: LessonStatus::default(),
      content_blocks: Vec::new(),
    }
  }

  pub fn course_id(&self) -> &str {
    &self.course_id
  }

  /// Reassign `order` from position. Called after every structural edit.
  pub(crate) fn renumber(&mut self) {
    for (i, block) in self.content_blocks.iter_mut().enumerate() {
      block.order = i;
    }
  }
}
