mod test_support;

use std::sync::Arc;
use std::time::Duration;

use lesson_author::assets::{perform_upload, AssetUploader};
use lesson_author::domain::{BlockPayload, BlockType};
use lesson_author::editor::Direction;
use lesson_author::error::{AuthoringError, EditError, UploadError, ValidationError};
use lesson_author::session::EditingSession;
use lesson_author::state::run_upload;
use lesson_author::upload::{BlockAsset, ItemAsset, UploadAddress, UploadStatus, DEFAULT_MAX_BYTES};
use tokio::sync::Mutex;
use test_support::{item, pdf, png, FakeUploader};

const TIMEOUT: Duration = Duration::from_secs(5);

fn session() -> EditingSession {
    EditingSession::new("course-1", DEFAULT_MAX_BYTES)
}

fn image_of(s: &EditingSession, block: usize) -> String {
    match &s.draft().content_blocks[block].payload {
        BlockPayload::Image(p) => p.image_url.clone(),
        BlockPayload::Tip(p) => p.image_url.clone(),
        other => panic!("no image field on {other:?}"),
    }
}

#[tokio::test]
async fn successful_upload_commits_cover_url() {
    let mut s = session();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("cover.png", 64)).unwrap();
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Uploading));
    assert_eq!(s.draft().image, "");
    assert_eq!(s.uploads().live_previews(), 1);

    let uploader = FakeUploader::ok("https://cdn/cover.png");
    let result = perform_upload(&uploader, &ticket, TIMEOUT, None).await;
    let committed = s.resolve_upload(ticket.seq, result).unwrap();

    assert_eq!(committed, Some(UploadAddress::LessonCover));
    assert_eq!(s.draft().image, "https://cdn/cover.png");
    let task = s.uploads().get(&UploadAddress::LessonCover).unwrap();
    assert_eq!(task.status, UploadStatus::Done);
    assert_eq!(task.preview_url(), Some("https://cdn/cover.png"));
    assert_eq!(s.uploads().live_previews(), 0);
}

#[tokio::test]
async fn refused_upload_leaves_field_untouched() {
    let mut s = session();
    s.add_block(BlockType::Image).unwrap();
    let addr = UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl };
    let ticket = s.begin_upload(addr, png("a.png", 10)).unwrap();

    let uploader = FakeUploader::refusing("Unsupported file");
    let result = perform_upload(&uploader, &ticket, TIMEOUT, None).await;
    let err = s.resolve_upload(ticket.seq, result).unwrap_err();

    assert!(matches!(err, AuthoringError::Upload(UploadError::Rejected { ref message }) if message == "Unsupported file"));
    assert_eq!(image_of(&s, 0), "");
    let task = s.uploads().get(&addr).unwrap();
    assert_eq!(task.status, UploadStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("Unsupported file"));
    assert_eq!(task.preview_url(), None);
}

#[tokio::test]
async fn refusal_without_message_uses_generic_text() {
    let mut s = session();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("a.png", 10)).unwrap();
    let uploader = FakeUploader::refusing("");
    let result = perform_upload(&uploader, &ticket, TIMEOUT, None).await;
    assert_eq!(result, Err(UploadError::Rejected { message: "Upload failed".into() }));
}

#[tokio::test]
async fn error_status_without_message_is_a_transport_failure() {
    let mut s = session();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("a.png", 10)).unwrap();
    let uploader = FakeUploader::status(503);
    let result = perform_upload(&uploader, &ticket, TIMEOUT, None).await;
    assert!(matches!(result, Err(UploadError::Transport(_))));
}

#[tokio::test]
async fn second_selection_wins_regardless_of_completion_order() {
    let mut s = session();
    let first = s.begin_upload(UploadAddress::LessonCover, png("one.png", 10)).unwrap();
    let second = s.begin_upload(UploadAddress::LessonCover, png("two.png", 10)).unwrap();
    assert!(second.seq > first.seq);
    // the first preview was released when it was superseded
    assert_eq!(s.uploads().live_previews(), 1);

    let committed = s.resolve_upload(second.seq, Ok("https://cdn/two.png".into())).unwrap();
    assert_eq!(committed, Some(UploadAddress::LessonCover));
    let stale = s.resolve_upload(first.seq, Ok("https://cdn/one.png".into())).unwrap();
    assert_eq!(stale, None);

    assert_eq!(s.draft().image, "https://cdn/two.png");
}

#[tokio::test]
async fn stale_failure_does_not_touch_newer_task() {
    let mut s = session();
    let first = s.begin_upload(UploadAddress::LessonCover, png("one.png", 10)).unwrap();
    let _second = s.begin_upload(UploadAddress::LessonCover, png("two.png", 10)).unwrap();

    let ignored = s.resolve_upload(first.seq, Err(UploadError::TimedOut { secs: 45 })).unwrap();
    assert_eq!(ignored, None);
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Uploading));
}

#[tokio::test]
async fn timeout_marks_task_failed() {
    let mut s = session();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("slow.png", 10)).unwrap();
    let uploader = FakeUploader::ok("https://cdn/late.png").delayed(Duration::from_millis(200));

    let result = perform_upload(&uploader, &ticket, Duration::from_millis(20), None).await;
    assert!(matches!(result, Err(UploadError::TimedOut { .. })));
    assert!(s.resolve_upload(ticket.seq, result).is_err());

    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Failed));
    assert_eq!(s.draft().image, "");
}

#[tokio::test]
async fn discard_drops_late_results_and_releases_previews() {
    let shared = Arc::new(Mutex::new(session()));
    let ticket = shared
        .lock()
        .await
        .begin_upload(UploadAddress::LessonCover, png("a.png", 10))
        .unwrap();
    assert_eq!(shared.lock().await.uploads().live_previews(), 1);

    let uploader: Arc<dyn AssetUploader> =
        Arc::new(FakeUploader::ok("https://cdn/a.png").delayed(Duration::from_millis(50)));
    let pending = tokio::spawn(run_upload(shared.clone(), uploader, ticket, TIMEOUT));

    shared.lock().await.discard();
    pending.await.unwrap();

    let s = shared.lock().await;
    assert!(s.is_discarded());
    assert_eq!(s.uploads().live_previews(), 0);
    assert_eq!(s.draft().image, "");
    assert!(s.uploads().get(&UploadAddress::LessonCover).is_none());
}

#[tokio::test]
async fn background_upload_commits_through_shared_session() {
    let shared = Arc::new(Mutex::new(session()));
    shared.lock().await.add_block(BlockType::Pdf).unwrap();
    let addr = UploadAddress::Block { block: 0, field: BlockAsset::PdfUrl };
    let ticket = shared.lock().await.begin_upload(addr, pdf("guide.pdf")).unwrap();

    let fake = Arc::new(FakeUploader::ok("https://cdn/guide.pdf"));
    let uploader: Arc<dyn AssetUploader> = fake.clone();
    run_upload(shared.clone(), uploader, ticket, TIMEOUT).await;

    let s = shared.lock().await;
    match &s.draft().content_blocks[0].payload {
        BlockPayload::Pdf(p) => assert_eq!(p.pdf_url, "https://cdn/guide.pdf"),
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(fake.calls(), 1);
}

#[test]
fn oversize_and_wrong_type_are_rejected_before_any_upload() {
    let mut s = EditingSession::new("course-1", 16);
    s.add_block(BlockType::Pdf).unwrap();

    let err = s.begin_upload(UploadAddress::LessonCover, png("huge.png", 17)).unwrap_err();
    assert!(matches!(err, AuthoringError::Validation(ValidationError::FileTooLarge { size: 17, limit: 16, .. })));

    let pdf_addr = UploadAddress::Block { block: 0, field: BlockAsset::PdfUrl };
    let err = s.begin_upload(pdf_addr, png("a.png", 4)).unwrap_err();
    assert!(matches!(err, AuthoringError::Validation(ValidationError::UnsupportedMediaType { .. })));

    assert_eq!(s.uploads().tasks().count(), 0);
    assert_eq!(s.uploads().live_previews(), 0);
}

#[test]
fn upload_to_a_field_the_block_lacks_is_rejected() {
    let mut s = session();
    s.add_block(BlockType::Text).unwrap();
    let err = s
        .begin_upload(UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }, png("a.png", 4))
        .unwrap_err();
    assert!(matches!(err, AuthoringError::Edit(EditError::InvalidBlockOperation { .. })));

    let err = s
        .begin_upload(UploadAddress::Block { block: 4, field: BlockAsset::ImageUrl }, png("a.png", 4))
        .unwrap_err();
    assert!(matches!(err, AuthoringError::Edit(EditError::BlockOutOfRange { .. })));
}

#[test]
fn in_flight_upload_follows_its_block_when_moved() {
    let mut s = session();
    s.add_block(BlockType::Text).unwrap();
    s.add_block(BlockType::Image).unwrap();
    let ticket = s
        .begin_upload(UploadAddress::Block { block: 1, field: BlockAsset::ImageUrl }, png("a.png", 4))
        .unwrap();

    s.move_block(1, Direction::Up).unwrap();
    let committed = s.resolve_upload(ticket.seq, Ok("https://cdn/a.png".into())).unwrap();

    assert_eq!(committed, Some(UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }));
    assert_eq!(image_of(&s, 0), "https://cdn/a.png");
}

#[test]
fn removing_a_block_drops_its_upload_and_shifts_the_rest() {
    let mut s = session();
    s.add_block(BlockType::Image).unwrap();
    s.add_block(BlockType::Tip).unwrap();
    let gone = s
        .begin_upload(UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }, png("a.png", 4))
        .unwrap();
    let kept = s
        .begin_upload(UploadAddress::Block { block: 1, field: BlockAsset::ImageUrl }, png("b.png", 4))
        .unwrap();

    s.remove_block(0).unwrap();
    assert_eq!(s.uploads().live_previews(), 1);
    assert_eq!(s.resolve_upload(gone.seq, Ok("https://cdn/a.png".into())).unwrap(), None);
    let committed = s.resolve_upload(kept.seq, Ok("https://cdn/b.png".into())).unwrap();

    assert_eq!(committed, Some(UploadAddress::Block { block: 0, field: BlockAsset::ImageUrl }));
    assert_eq!(image_of(&s, 0), "https://cdn/b.png");
}

#[test]
fn removing_an_item_shifts_later_item_uploads() {
    let mut s = session();
    s.add_block(BlockType::Content).unwrap();
    s.add_item(0, item("Chamomile")).unwrap();
    s.add_item(0, item("Mint")).unwrap();
    let ticket = s
        .begin_upload(UploadAddress::Item { block: 0, item: 1, field: ItemAsset::ImageUrl }, png("mint.png", 4))
        .unwrap();

    s.remove_item(0, 0).unwrap();
    s.resolve_upload(ticket.seq, Ok("https://cdn/mint.png".into())).unwrap();

    let items = s.draft().content_blocks[0].items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Mint");
    assert_eq!(items[0].image_url, "https://cdn/mint.png");
}

#[test]
fn clearing_an_asset_empties_the_field() {
    let mut s = session();
    let ticket = s.begin_upload(UploadAddress::LessonCover, png("a.png", 4)).unwrap();
    s.resolve_upload(ticket.seq, Ok("https://cdn/a.png".into())).unwrap();

    s.clear_asset(&UploadAddress::LessonCover).unwrap();
    assert_eq!(s.draft().image, "");
    assert!(s.uploads().get(&UploadAddress::LessonCover).is_none());
}

#[test]
fn drag_state_is_transient() {
    let mut s = session();
    s.mark_dragging(UploadAddress::LessonCover).unwrap();
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Dragging));
    s.cancel_dragging(&UploadAddress::LessonCover);
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), None);

    let ticket = s.begin_upload(UploadAddress::LessonCover, png("a.png", 4)).unwrap();
    s.mark_dragging(UploadAddress::LessonCover).unwrap();
    // an upload in flight is not disturbed by hovering
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Uploading));
    s.resolve_upload(ticket.seq, Ok("https://cdn/a.png".into())).unwrap();

    s.mark_dragging(UploadAddress::LessonCover).unwrap();
    s.cancel_dragging(&UploadAddress::LessonCover);
    assert_eq!(s.upload_status(&UploadAddress::LessonCover), Some(UploadStatus::Done));
}
