use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// Generic acknowledgement for lifecycle commands.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Response returned once an activity has been started.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
    pub duration_minutes: f64,
    pub will_end_at: String,
}

/// Student answer submission.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SubmitRequest {
    pub answer: String,
    /// Expected order for memory games authored without an answer key.
    #[serde(default)]
    pub correct_sequence: Option<String>,
}

/// Status as seen by a student.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct StudentStatus {
    pub is_active: bool,
    pub has_responded: bool,
    pub my_answer: Option<String>,
}

/// Status as seen by the instructor or an admin.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct StaffStatus {
    pub is_active: bool,
    pub response_count: u64,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

/// Role-dependent status view.
#[derive(Debug, Serialize, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum ActivityStatus {
    Student(StudentStatus),
    Staff(StaffStatus),
}
