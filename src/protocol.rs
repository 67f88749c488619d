//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ContentItem, LessonDraft};
use crate::editor::Direction;
use crate::session::EditingSession;
use crate::upload::{UploadAddress, UploadStatus};
use crate::wizard::{StepOutcome, WizardStep, LAST_STEP};

//
// HTTP request DTOs
//

/// Either `courseId` (new lesson) or `lessonId` (edit an existing one).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionIn {
    pub course_id: Option<String>,
    pub lesson_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddBlockIn {
    #[serde(rename = "type")]
    pub block_type: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveIn {
    pub direction: Direction,
}

/// Items are added with whatever the author already typed.
pub type AddItemIn = ContentItem;

#[derive(Debug, Deserialize)]
pub struct GoToIn {
    pub step: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIn {
    pub address: UploadAddress,
    pub file_name: String,
    pub mime: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressIn {
    pub address: UploadAddress,
}

#[derive(Debug, Deserialize)]
pub struct DragIn {
    pub address: UploadAddress,
    pub active: bool,
}

//
// HTTP response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOut {
    pub address: UploadAddress,
    pub seq: u64,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardOut {
    pub current: usize,
    pub step: WizardStep,
    pub label: &'static str,
    pub completed: Vec<usize>,
    pub can_submit: bool,
    pub last_step: usize,
}

/// Full view of a session, returned after every edit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub id: String,
    pub draft: LessonDraft,
    pub wizard: WizardOut,
    /// Validation of the current step, for enabling the "Next" affordance.
    pub step_outcome: StepOutcome,
    pub uploads: Vec<UploadOut>,
}

/// Convert a session (internal) to the public DTO.
pub fn to_out(session: &EditingSession) -> SessionOut {
    let wizard = session.wizard();
    let step = wizard.current_step();
    let mut uploads: Vec<UploadOut> = session
        .uploads()
        .tasks()
        .map(|(address, task)| UploadOut {
            address: *address,
            seq: task.seq,
            status: task.status,
            preview_url: task.preview_url().map(str::to_string),
            remote_url: task.remote_url.clone(),
            error: task.error.clone(),
        })
        .collect();
    uploads.sort_by_key(|u| u.seq);

    SessionOut {
        id: session.id().to_string(),
        draft: session.draft().clone(),
        wizard: WizardOut {
            current: wizard.current(),
            step,
            label: step.label(),
            completed: wizard.completed().iter().copied().collect(),
            can_submit: wizard.can_submit(),
            last_step: LAST_STEP,
        },
        step_outcome: session.validate_current(),
        uploads,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOut {
    pub lesson_id: String,
    pub created: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
