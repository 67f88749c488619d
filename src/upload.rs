//! Per-address asset upload bookkeeping.
//!
//! One map from a structured address to the live [`AssetUploadTask`] at that
//! address. Tasks carry a sequence number taken from a registry-wide counter;
//! a completion is applied only if its sequence number still names the live
//! task, so a slow, superseded upload can never overwrite a newer selection.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ValidationError;

/// Largest file accepted for upload: 5 MiB.
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// What kind of file an address accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
  Image,
  Pdf,
}

impl AssetKind {
  pub fn accepts(&self, mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    match self {
      Self::Image => mime.starts_with("image/"),
      Self::Pdf => mime == "application/pdf",
    }
  }

  pub fn expected(&self) -> &'static str {
    match self {
      Self::Image => "an image",
      Self::Pdf => "a PDF",
    }
  }
}

/// Block-level asset fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockAsset {
  ImageUrl,
  PdfUrl,
}

/// Asset fields of a content item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemAsset {
  ImageUrl,
}

/// Composite key identifying where an uploaded asset will be committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum UploadAddress {
  /// The lesson's own cover image.
  LessonCover,
  Block { block: usize, field: BlockAsset },
  Item { block: usize, item: usize, field: ItemAsset },
}

impl UploadAddress {
  pub fn kind(&self) -> AssetKind {
    match self {
      Self::Block { field: BlockAsset::PdfUrl, .. } => AssetKind::Pdf,
      _ => AssetKind::Image,
    }
  }

  pub fn block(&self) -> Option<usize> {
    match self {
      Self::LessonCover => None,
      Self::Block { block, .. } | Self::Item { block, .. } => Some(*block),
    }
  }

  fn with_block(self, to: usize) -> Self {
    match self {
      Self::LessonCover => self,
      Self::Block { field, .. } => Self::Block { block: to, field },
      Self::Item { item, field, .. } => Self::Item { block: to, item, field },
    }
  }
}

impl fmt::Display for UploadAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::LessonCover => f.write_str("lesson.image"),
      Self::Block { block, field } => write!(f, "blocks[{block}].{field:?}"),
      Self::Item { block, item, field } => write!(f, "blocks[{block}].items[{item}].{field:?}"),
    }
  }
}

/// A file chosen (or dropped) by the author.
#[derive(Clone)]
pub struct SelectedFile {
  pub name: String,
  pub mime: String,
  pub bytes: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SelectedFile")
      .field("name", &self.name)
      .field("mime", &self.mime)
      .field("len", &self.bytes.len())
      .finish()
  }
}

/// Client-only preview of a selected file. The registry counts live handles;
/// dropping the handle releases it.
pub struct PreviewHandle {
  id: Uuid,
  data_url: String,
  live: Arc<AtomicUsize>,
}

impl PreviewHandle {
  fn new(file: &SelectedFile, live: &Arc<AtomicUsize>) -> Self {
    live.fetch_add(1, Ordering::SeqCst);
    Self {
      id: Uuid::new_v4(),
      data_url: format!("data:{};base64,{}", file.mime, STANDARD.encode(&file.bytes)),
      live: Arc::clone(live),
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn url(&self) -> &str {
    &self.data_url
  }
}

impl Drop for PreviewHandle {
  fn drop(&mut self) {
    self.live.fetch_sub(1, Ordering::SeqCst);
  }
}

impl fmt::Debug for PreviewHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PreviewHandle").field("id", &self.id).finish()
  }
}

/// What the editing surface shows for an address.
#[derive(Debug)]
pub enum Preview {
  /// Selected file awaiting (or undergoing) upload.
  Local(PreviewHandle),
  /// Already committed remote asset.
  Remote(String),
}

impl Preview {
  pub fn url(&self) -> &str {
    match self {
      Self::Local(h) => h.url(),
      Self::Remote(u) => u,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
  Idle,
  Dragging,
  Uploading,
  Done,
  Failed,
}

impl UploadStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Done | Self::Failed)
  }
}

#[derive(Debug)]
pub struct AssetUploadTask {
  pub seq: u64,
  pub status: UploadStatus,
  preview: Option<Preview>,
  pub remote_url: Option<String>,
  pub error: Option<String>,
}

impl AssetUploadTask {
  pub fn preview_url(&self) -> Option<&str> {
    self.preview.as_ref().map(Preview::url)
  }
}

/// Handed back by [`UploadRegistry::begin`]; carries what the network step
/// needs and the sequence number its result must be resolved with.
#[derive(Debug, Clone)]
pub struct UploadTicket {
  pub address: UploadAddress,
  pub seq: u64,
  pub file: SelectedFile,
}

#[derive(Debug)]
pub struct UploadRegistry {
  tasks: HashMap<UploadAddress, AssetUploadTask>,
  next_seq: u64,
  max_bytes: usize,
  live_previews: Arc<AtomicUsize>,
  closed: bool,
}

impl Default for UploadRegistry {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_BYTES)
  }
}

impl UploadRegistry {
  pub fn new(max_bytes: usize) -> Self {
    Self {
      tasks: HashMap::new(),
      next_seq: 1,
      max_bytes,
      live_previews: Arc::new(AtomicUsize::new(0)),
      closed: false,
    }
  }

  pub fn max_bytes(&self) -> usize {
    self.max_bytes
  }

  /// Check MIME type and size for `address` without touching the registry.
  pub fn validate(&self, address: &UploadAddress, file: &SelectedFile) -> Result<(), ValidationError> {
    let kind = address.kind();
    if !kind.accepts(&file.mime) {
      return Err(ValidationError::UnsupportedMediaType {
        file: file.name.clone(),
        expected: kind.expected(),
        found: file.mime.clone(),
      });
    }
    if file.bytes.len() > self.max_bytes {
      return Err(ValidationError::FileTooLarge {
        file: file.name.clone(),
        size: file.bytes.len(),
        limit: self.max_bytes,
      });
    }
    Ok(())
  }

  fn take_seq(&mut self) -> u64 {
    let seq = self.next_seq;
    self.next_seq += 1;
    seq
  }

  /// Drag-over affordance. An address with an upload in flight is left alone.
  pub fn mark_dragging(&mut self, address: UploadAddress) {
    if self.closed {
      return;
    }
    if let Some(task) = self.tasks.get_mut(&address) {
      match task.status {
        UploadStatus::Uploading | UploadStatus::Dragging => {}
        _ => task.status = UploadStatus::Dragging,
      }
      return;
    }
    let seq = self.take_seq();
    self.tasks.insert(address, AssetUploadTask {
      seq,
      status: UploadStatus::Dragging,
      preview: None,
      remote_url: None,
      error: None,
    });
  }

  /// Drag left the address without a drop.
  pub fn cancel_dragging(&mut self, address: &UploadAddress) {
    let Some(task) = self.tasks.get_mut(address) else { return };
    if task.status != UploadStatus::Dragging {
      return;
    }
    if task.preview.is_none() && task.remote_url.is_none() {
      self.tasks.remove(address);
    } else if task.remote_url.is_some() {
      task.status = UploadStatus::Done;
    } else {
      task.status = UploadStatus::Idle;
    }
  }

  /// Validate `file`, then record a fresh uploading task with a local preview.
  /// Any earlier task at `address` is superseded and its preview released.
  pub fn begin(&mut self, address: UploadAddress, file: SelectedFile) -> Result<UploadTicket, ValidationError> {
    if let Err(e) = self.validate(&address, &file) {
      warn!(target: "upload", %address, error = %e, "Rejected file before upload");
      return Err(e);
    }
    let seq = self.take_seq();
    let preview = PreviewHandle::new(&file, &self.live_previews);
    let previous = self.tasks.insert(address, AssetUploadTask {
      seq,
      status: UploadStatus::Uploading,
      preview: Some(Preview::Local(preview)),
      remote_url: None,
      error: None,
    });
    match previous.map(|t| (t.seq, t.status)) {
      Some((old, UploadStatus::Uploading)) => {
        info!(target: "upload", %address, seq, superseded = old, "Upload superseded an in-flight task")
      }
      Some((_, from)) => debug!(target: "upload", %address, seq, ?from, "Upload started"),
      None => debug!(target: "upload", %address, seq, "Upload started"),
    }
    Ok(UploadTicket { address, seq, file })
  }

  /// Address of the live uploading task with sequence number `seq`.
  fn live_address(&self, seq: u64) -> Option<UploadAddress> {
    self
      .tasks
      .iter()
      .find(|(_, t)| t.seq == seq && t.status == UploadStatus::Uploading)
      .map(|(a, _)| *a)
  }

  /// Mark task `seq` done and hand its URL to `commit`. Returns `Ok(None)`
  /// when the task was superseded, cleared or the registry is closed; the
  /// commit callback is not invoked in that case.
  pub fn complete<E, F>(&mut self, seq: u64, url: String, commit: F) -> Result<Option<UploadAddress>, E>
  where
    F: FnOnce(&UploadAddress, &str) -> Result<(), E>,
    E: fmt::Display,
  {
    if self.closed {
      debug!(target: "upload", seq, "Completion after close ignored");
      return Ok(None);
    }
    let Some(address) = self.live_address(seq) else {
      info!(target: "upload", seq, "Stale upload completion ignored");
      return Ok(None);
    };
    if let Err(e) = commit(&address, &url) {
      warn!(target: "upload", %address, seq, error = %e, "Commit of uploaded asset failed");
      if let Some(task) = self.tasks.get_mut(&address) {
        task.status = UploadStatus::Failed;
        task.preview = None;
        task.error = Some(e.to_string());
      }
      return Err(e);
    }
    if let Some(task) = self.tasks.get_mut(&address) {
      task.status = UploadStatus::Done;
      task.preview = Some(Preview::Remote(url.clone()));
      task.remote_url = Some(url);
      task.error = None;
    }
    info!(target: "upload", %address, seq, "Upload committed");
    Ok(Some(address))
  }

  /// Mark task `seq` failed. The preview is discarded; nothing is committed.
  pub fn fail(&mut self, seq: u64, message: impl Into<String>) -> Option<UploadAddress> {
    if self.closed {
      return None;
    }
    let Some(address) = self.live_address(seq) else {
      info!(target: "upload", seq, "Stale upload failure ignored");
      return None;
    };
    let message = message.into();
    if let Some(task) = self.tasks.get_mut(&address) {
      task.status = UploadStatus::Failed;
      task.preview = None;
      task.error = Some(message.clone());
    }
    warn!(target: "upload", %address, seq, error = %message, "Upload failed");
    Some(address)
  }

  /// Drop whatever is recorded at `address`, releasing its preview.
  pub fn clear(&mut self, address: &UploadAddress) -> bool {
    self.tasks.remove(address).is_some()
  }

  /// Seed a finished task from an already committed URL (edit mode).
  pub fn restore(&mut self, address: UploadAddress, url: impl Into<String>) {
    let url = url.into();
    if url.trim().is_empty() {
      return;
    }
    let seq = self.take_seq();
    self.tasks.insert(address, AssetUploadTask {
      seq,
      status: UploadStatus::Done,
      preview: Some(Preview::Remote(url.clone())),
      remote_url: Some(url),
      error: None,
    });
  }

  /// Keep addresses aligned after block `removed` left the draft: its own
  /// entries are dropped, later blocks shift down by one.
  pub fn remove_block(&mut self, removed: usize) {
    self.rekey(|block| match block {
      b if b == removed => None,
      b if b > removed => Some(b - 1),
      b => Some(b),
    });
  }

  /// Keep addresses aligned after blocks `a` and `b` swapped places.
  pub fn swap_blocks(&mut self, a: usize, b: usize) {
    self.rekey(|block| {
      Some(match block {
        x if x == a => b,
        x if x == b => a,
        x => x,
      })
    });
  }

  /// Keep item addresses aligned after an item left a content block.
  pub fn remove_item(&mut self, block: usize, removed: usize) {
    let tasks = std::mem::take(&mut self.tasks);
    self.tasks = tasks
      .into_iter()
      .filter_map(|(address, task)| match address {
        UploadAddress::Item { block: b, item, field } if b == block => match item {
          i if i == removed => None,
          i if i > removed => Some((UploadAddress::Item { block: b, item: i - 1, field }, task)),
          _ => Some((address, task)),
        },
        _ => Some((address, task)),
      })
      .collect();
  }

  fn rekey(&mut self, map: impl Fn(usize) -> Option<usize>) {
    let tasks = std::mem::take(&mut self.tasks);
    self.tasks = tasks
      .into_iter()
      .filter_map(|(address, task)| match address.block() {
        None => Some((address, task)),
        Some(b) => map(b).map(|to| (address.with_block(to), task)),
      })
      .collect();
  }

  /// Release every preview and ignore all later completions.
  pub fn close(&mut self) {
    let outstanding = self.in_flight();
    self.tasks.clear();
    self.closed = true;
    debug!(target: "upload", outstanding, "Upload registry closed");
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  pub fn get(&self, address: &UploadAddress) -> Option<&AssetUploadTask> {
    self.tasks.get(address)
  }

  pub fn tasks(&self) -> impl Iterator<Item = (&UploadAddress, &AssetUploadTask)> {
    self.tasks.iter()
  }

  /// Number of uploads still waiting on the network.
  pub fn in_flight(&self) -> usize {
    self.tasks.values().filter(|t| t.status == UploadStatus::Uploading).count()
  }

  /// Number of local preview handles not yet released.
  pub fn live_previews(&self) -> usize {
    self.live_previews.load(Ordering::SeqCst)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn png(len: usize) -> SelectedFile {
    SelectedFile { name: "a.png".into(), mime: "image/png".into(), bytes: vec![0; len] }
  }

  #[test]
  fn pdf_fields_only_accept_pdf() {
    let reg = UploadRegistry::default();
    let addr = UploadAddress::Block { block: 0, field: BlockAsset::PdfUrl };
    assert!(matches!(
      reg.validate(&addr, &png(10)),
      Err(ValidationError::UnsupportedMediaType { .. })
    ));
    let pdf = SelectedFile { name: "a.pdf".into(), mime: "application/pdf".into(), bytes: vec![1] };
    assert!(reg.validate(&addr, &pdf).is_ok());
  }

  #[test]
  fn size_limit_is_inclusive() {
    let reg = UploadRegistry::new(8);
    assert!(reg.validate(&UploadAddress::LessonCover, &png(8)).is_ok());
    assert!(matches!(
      reg.validate(&UploadAddress::LessonCover, &png(9)),
      Err(ValidationError::FileTooLarge { size: 9, limit: 8, .. })
    ));
  }

  #[test]
  fn removing_a_block_shifts_later_addresses() {
    let mut reg = UploadRegistry::default();
    reg.restore(UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }, "https://a");
    reg.restore(UploadAddress::Block { block: 2, field: BlockAsset::ImageUrl }, "https://c");
    reg.remove_block(0);
    assert!(reg.get(&UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }).is_none());
    let moved = reg.get(&UploadAddress::Block { block: 1, field: BlockAsset::ImageUrl }).unwrap();
    assert_eq!(moved.remote_url.as_deref(), Some("https://c"));
  }

  #[test]
  fn preview_is_a_data_url() {
    let live = Arc::new(AtomicUsize::new(0));
    let h = PreviewHandle::new(&png(3), &live);
    assert!(h.url().starts_with("data:image/png;base64,"));
    assert_eq!(live.load(Ordering::SeqCst), 1);
    drop(h);
    assert_eq!(live.load(Ordering::SeqCst), 0);
  }
}
