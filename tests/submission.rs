mod test_support;

use lesson_author::domain::LessonStatus;
use lesson_author::editor::{BlockField, LessonField};
use lesson_author::error::{AuthoringError, SubmissionError, ValidationError};
use lesson_author::session::EditingSession;
use lesson_author::upload::{UploadAddress, DEFAULT_MAX_BYTES};
use lesson_author::wire::LessonRecord;
use serde_json::json;
use test_support::{complete_draft, png, FakeStore};

/// Session whose draft matches `complete_draft()`, built through the session
/// so the cover URL arrives by upload.
fn ready_session() -> EditingSession {
    let template = complete_draft();
    let mut s = EditingSession::new(template.course_id(), DEFAULT_MAX_BYTES);
    s.update_lesson_field(LessonField::Title(template.title.clone())).unwrap();
    s.update_lesson_field(LessonField::Description(template.description.clone())).unwrap();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("cover.png", 32)).unwrap();
    s.resolve_upload(ticket.seq, Ok(template.image.clone())).unwrap();
    s.add_block(lesson_author::domain::BlockType::Text).unwrap();
    s.update_block_field(0, BlockField::HtmlContent("<p>Hello</p>".into())).unwrap();
    s
}

fn at_final_step(mut s: EditingSession) -> EditingSession {
    s.next_step().unwrap();
    s.next_step().unwrap();
    s
}

#[tokio::test]
async fn first_submission_creates_then_later_ones_update() {
    let store = FakeStore::default();
    let mut s = at_final_step(ready_session());
    assert_eq!(s.draft(), &complete_draft());

    let first = s.submit(&store).await.unwrap();
    assert_eq!(first.lesson_id, "lesson-1");
    assert!(first.created);
    assert_eq!(s.draft().lesson_id.as_deref(), Some("lesson-1"));

    s.update_lesson_field(LessonField::Status(LessonStatus::Inactive)).unwrap();
    let second = s.submit(&store).await.unwrap();
    assert!(!second.created);

    let created = store.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].course_id, "course-1");
    assert_eq!(created[0].content_blocks[0].block_type, "text");
    let updated = store.updated.lock().unwrap();
    assert_eq!(updated[0].0, "lesson-1");
    assert_eq!(updated[0].1.status, LessonStatus::Inactive);
}

#[tokio::test]
async fn submission_requires_the_final_step() {
    let store = FakeStore::default();
    let mut s = ready_session();
    s.next_step().unwrap();

    let err = s.submit(&store).await.unwrap_err();
    assert!(matches!(err, AuthoringError::Validation(ValidationError::NotAtFinalStep)));
    assert!(store.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn draft_edited_after_review_is_revalidated() {
    let store = FakeStore::default();
    let mut s = at_final_step(ready_session());
    s.update_lesson_field(LessonField::Title("  ".into())).unwrap();

    let err = s.submit(&store).await.unwrap_err();
    assert!(matches!(err, AuthoringError::Validation(ValidationError::StepIncomplete(_))));
    assert!(store.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failure_surfaces_collaborator_message_and_keeps_draft() {
    let store = FakeStore::failing(Some("Title already taken"));
    let mut s = at_final_step(ready_session());
    let before = s.draft().clone();

    let err = s.submit(&store).await.unwrap_err();
    match err {
        AuthoringError::Submission(SubmissionError { message }) => assert_eq!(message, "Title already taken"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(s.draft(), &before);
    assert_eq!(s.wizard().current(), 2);
}

#[tokio::test]
async fn failure_without_message_uses_fallback() {
    let store = FakeStore::failing(None);
    let mut s = at_final_step(ready_session());
    let err = s.submit(&store).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to save lesson");
}

#[tokio::test]
async fn discarded_session_refuses_work() {
    let store = FakeStore::default();
    let mut s = at_final_step(ready_session());
    s.discard();

    assert!(matches!(s.submit(&store).await, Err(AuthoringError::Discarded)));
    assert!(matches!(s.add_block(lesson_author::domain::BlockType::Pdf), Err(AuthoringError::Discarded)));
}

#[tokio::test]
async fn edit_mode_submission_updates_existing_lesson() {
    let record: LessonRecord = serde_json::from_value(json!({
        "id": "lesson-77",
        "course_id": "course-1",
        "title": "Herbal teas",
        "description": "Brewing basics",
        "image": "https://cdn/cover.png",
        "content_blocks": [{ "type": "text", "order": 0, "content": { "htmlContent": "<p>Hi</p>" } }]
    }))
    .unwrap();
    let store = FakeStore::default();
    let mut s = at_final_step(EditingSession::from_record(record, DEFAULT_MAX_BYTES).unwrap());

    let done = s.submit(&store).await.unwrap();
    assert_eq!(done.lesson_id, "lesson-77");
    assert!(!done.created);
    assert_eq!(store.updated.lock().unwrap().len(), 1);
}
