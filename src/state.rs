//! Application state: in-memory editing sessions and collaborator clients.
//!
//! This module owns:
//!   - the session store (by id)
//!   - the lesson API client (persistence, lesson read, remedy lookup)
//!   - the asset uploader
//!   - loaded configuration
//!
//! Sessions sit behind their own mutex. An upload holds that mutex only to
//! validate and record the preview, and again to apply the result; the
//! network call itself runs unlocked on a spawned task.
//!
//! Sessions leave the store through `DELETE /sessions/{id}` or, when a client
//! walks away, through [`AppState::evict_idle`] once they have gone untouched
//! for `server.session_idle_secs`.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument};

use crate::assets::{perform_upload, AssetUploader, HttpAssetUploader};
use crate::config::{load_author_config_from_env, AuthorConfig};
use crate::error::{ApiError, AuthoringError};
use crate::lesson_api::{HttpLessonApi, LessonStore};
use crate::session::EditingSession;
use crate::upload::{SelectedFile, UploadAddress, UploadTicket};

pub type SharedSession = Arc<Mutex<EditingSession>>;

/// A stored session plus the time it was last looked up, in milliseconds
/// since the owning store was created.
#[derive(Clone)]
pub struct SessionSlot {
    pub session: SharedSession,
    last_seen_ms: Arc<AtomicU64>,
}

impl SessionSlot {
    fn touch(&self, now_ms: u64) {
        self.last_seen_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    fn idle_for(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_seen_ms.load(Ordering::Relaxed)))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    pub lessons: Arc<dyn LessonStore>,
    pub uploader: Arc<dyn AssetUploader>,
    pub config: AuthorConfig,
    started: Instant,
}

impl AppState {
    /// Build state from env: load config, construct the HTTP collaborators.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, ApiError> {
        let config = load_author_config_from_env();
        let lessons = HttpLessonApi::new(&config.api)?;
        let uploader = HttpAssetUploader::new(&config.upload, config.api.token.clone())?;
        info!(
            target: "lesson_author",
            api = %config.api.base_url,
            upload = %config.upload.endpoint,
            max_bytes = config.upload.max_bytes,
            timeout_secs = config.upload.timeout_secs,
            "Collaborators configured"
        );
        Ok(Self::with_collaborators(config, Arc::new(lessons), Arc::new(uploader)))
    }

    pub fn with_collaborators(
        config: AuthorConfig,
        lessons: Arc<dyn LessonStore>,
        uploader: Arc<dyn AssetUploader>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lessons,
            uploader,
            config,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn insert(&self, session: EditingSession) -> (String, SharedSession) {
        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        let slot = SessionSlot {
            session: shared.clone(),
            last_seen_ms: Arc::new(AtomicU64::new(self.now_ms())),
        };
        self.sessions.write().await.insert(id.clone(), slot);
        (id, shared)
    }

    /// Start authoring a new lesson for `course_id`.
    #[instrument(level = "info", skip(self))]
    pub async fn open_session(&self, course_id: &str) -> (String, SharedSession) {
        let session = EditingSession::new(course_id, self.config.upload.max_bytes);
        let (id, shared) = self.insert(session).await;
        info!(target: "lesson_author", session = %id, %course_id, "Session opened");
        (id, shared)
    }

    /// Load `lesson_id` from the read collaborator and open it for editing.
    #[instrument(level = "info", skip(self))]
    pub async fn open_existing(&self, lesson_id: &str) -> Result<(String, SharedSession), AuthoringError> {
        let record = self.lessons.get_lesson(lesson_id).await?;
        let session = EditingSession::from_record(record, self.config.upload.max_bytes)?;
        Ok(self.insert(session).await)
    }

    /// Look up a session and mark it as used.
    pub async fn session(&self, id: &str) -> Result<SharedSession, AuthoringError> {
        let sessions = self.sessions.read().await;
        let slot = sessions
            .get(id)
            .ok_or_else(|| AuthoringError::UnknownSession(id.to_string()))?;
        slot.touch(self.now_ms());
        Ok(slot.session.clone())
    }

    /// Remove and discard a session. Uploads still running for it finish on
    /// their own but their results are dropped.
    #[instrument(level = "info", skip(self))]
    pub async fn discard(&self, id: &str) -> Result<(), AuthoringError> {
        let slot = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AuthoringError::UnknownSession(id.to_string()))?;
        slot.session.lock().await.discard();
        Ok(())
    }

    /// Discard every session not looked up within `max_idle`. Returns how
    /// many were removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.now_ms();
        let evicted: Vec<(String, SessionSlot)> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, slot)| slot.idle_for(now) >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|slot| (id, slot)))
                .collect()
        };
        for (id, slot) in &evicted {
            slot.session.lock().await.discard();
            info!(target: "lesson_author", session = %id, idle_secs = slot.idle_for(now).as_secs(), "Idle session evicted");
        }
        evicted.len()
    }

    /// Validate and record the upload synchronously, then run the network
    /// part in the background. Returns the ticket's sequence number.
    #[instrument(level = "info", skip(self, file), fields(%session_id, %address, file = %file.name, len = file.bytes.len()))]
    pub async fn begin_upload(
        &self,
        session_id: &str,
        address: UploadAddress,
        file: SelectedFile,
    ) -> Result<u64, AuthoringError> {
        let shared = self.session(session_id).await?;
        let ticket = shared.lock().await.begin_upload(address, file)?;
        let seq = ticket.seq;
        tokio::spawn(run_upload(
            shared,
            self.uploader.clone(),
            ticket,
            self.config.upload.timeout(),
        ));
        Ok(seq)
    }
}

/// Periodically evict idle sessions until the process exits.
pub async fn sweep_idle_sessions(state: Arc<AppState>, max_idle: Duration) {
    let mut tick = tokio::time::interval(max_idle.min(Duration::from_secs(60)).max(Duration::from_secs(1)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let evicted = state.evict_idle(max_idle).await;
        if evicted > 0 {
            debug!(target: "lesson_author", evicted, "Idle sweep finished");
        }
    }
}

/// Network half of an upload followed by resolution against the session.
pub async fn run_upload(
    session: SharedSession,
    uploader: Arc<dyn AssetUploader>,
    ticket: UploadTicket,
    timeout: std::time::Duration,
) {
    let result = perform_upload(uploader.as_ref(), &ticket, timeout, None).await;
    let mut guard = session.lock().await;
    match guard.resolve_upload(ticket.seq, result) {
        Ok(Some(address)) => debug!(target: "upload", %address, seq = ticket.seq, "Upload resolved"),
        Ok(None) => debug!(target: "upload", seq = ticket.seq, "Upload result dropped"),
        Err(e) => error!(target: "upload", address = %ticket.address, seq = ticket.seq, error = %e, "Upload did not commit"),
    }
}
