#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lesson_author::assets::{AssetUploader, ProgressFn, UploadResponse};
use lesson_author::domain::{BlockType, ContentItem, LessonDraft};
use lesson_author::editor::{self, BlockField, LessonField};
use lesson_author::error::ApiError;
use lesson_author::lesson_api::{LessonStore, RemedyOption};
use lesson_author::upload::SelectedFile;
use lesson_author::wire::{LessonPayload, LessonRecord};

pub fn png(name: &str, len: usize) -> SelectedFile {
    SelectedFile { name: name.into(), mime: "image/png".into(), bytes: vec![7; len] }
}

pub fn pdf(name: &str) -> SelectedFile {
    SelectedFile { name: name.into(), mime: "application/pdf".into(), bytes: b"%PDF-1.4".to_vec() }
}

/// A draft that passes steps 0 and 1.
pub fn complete_draft() -> LessonDraft {
    let d = LessonDraft::new("course-1");
    let d = editor::update_lesson_field(&d, LessonField::Title("Herbal teas".into()));
    let d = editor::update_lesson_field(&d, LessonField::Description("Brewing basics".into()));
    let d = editor::update_lesson_field(&d, LessonField::Image("https://cdn/cover.png".into()));
    let d = editor::add_block(&d, BlockType::Text);
    editor::update_block_field(&d, 0, BlockField::HtmlContent("<p>Hello</p>".into())).unwrap()
}

pub fn item(title: &str) -> ContentItem {
    ContentItem { title: title.into(), image_url: String::new() }
}

/// Uploader answering from a fixed script, optionally after a delay.
pub struct FakeUploader {
    pub response: Result<UploadResponse, u16>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeUploader {
    pub fn ok(url: &str) -> Self {
        Self {
            response: Ok(UploadResponse { success: true, url: Some(url.into()), message: None }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn refusing(message: &str) -> Self {
        Self {
            response: Ok(UploadResponse { success: false, url: None, message: Some(message.into()) }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn status(code: u16) -> Self {
        Self { response: Err(code), delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload(&self, _file: &SelectedFile, progress: Option<&ProgressFn>) -> Result<UploadResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(report) = progress {
            report(1, 1);
        }
        match &self.response {
            Ok(r) => Ok(r.clone()),
            Err(code) => Err(ApiError::Status { status: *code, message: None }),
        }
    }
}

/// In-memory lesson API.
#[derive(Default)]
pub struct FakeStore {
    pub created: Mutex<Vec<LessonPayload>>,
    pub updated: Mutex<Vec<(String, LessonPayload)>>,
    pub fail_with: Option<Option<String>>,
    pub record: Option<serde_json::Value>,
    pub remedies: Vec<RemedyOption>,
}

impl FakeStore {
    pub fn failing(message: Option<&str>) -> Self {
        Self { fail_with: Some(message.map(str::to_string)), ..Self::default() }
    }

    fn check(&self) -> Result<(), ApiError> {
        match &self.fail_with {
            Some(message) => Err(ApiError::Status { status: 500, message: message.clone() }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LessonStore for FakeStore {
    async fn create_lesson(&self, payload: &LessonPayload) -> Result<String, ApiError> {
        self.check()?;
        let mut created = self.created.lock().unwrap();
        created.push(payload.clone());
        Ok(format!("lesson-{}", created.len()))
    }

    async fn update_lesson(&self, id: &str, payload: &LessonPayload) -> Result<(), ApiError> {
        self.check()?;
        self.updated.lock().unwrap().push((id.to_string(), payload.clone()));
        Ok(())
    }

    async fn get_lesson(&self, id: &str) -> Result<LessonRecord, ApiError> {
        self.check()?;
        let value = self.record.clone().ok_or(ApiError::Status { status: 404, message: Some(format!("no lesson {id}")) })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list_remedies(&self) -> Result<Vec<RemedyOption>, ApiError> {
        self.check()?;
        Ok(self.remedies.clone())
    }
}
