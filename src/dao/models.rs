use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of interactive prompt an activity presents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Poll,
    ShortAnswer,
    Quiz,
    WordCloud,
    MemoryGame,
}

impl ActivityKind {
    /// Quiz and memory game responses carry a correctness flag and a score.
    pub fn is_gradeable(self) -> bool {
        matches!(self, ActivityKind::Quiz | ActivityKind::MemoryGame)
    }
}

/// Question format of a quiz activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    MultipleChoice,
    TrueFalse,
    FillBlank,
}

/// Persisted lifecycle state tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStateEntity {
    Draft,
    Running,
    Ended,
}

impl LifecycleStateEntity {
    /// Stable string used by backends that filter on the state column.
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStateEntity::Draft => "draft",
            LifecycleStateEntity::Running => "running",
            LifecycleStateEntity::Ended => "ended",
        }
    }
}

/// Lifecycle columns of an activity, written together with optimistic semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleEntity {
    pub state: LifecycleStateEntity,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    /// Bumped on every start; lets the expiry scheduler detect stale timers.
    pub start_epoch: u64,
}

impl LifecycleEntity {
    /// Lifecycle of a freshly created activity.
    pub fn draft() -> Self {
        Self {
            state: LifecycleStateEntity::Draft,
            started_at: None,
            ended_at: None,
            start_epoch: 0,
        }
    }
}

/// Activity definition persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntity {
    /// Primary key of the activity.
    pub id: Uuid,
    /// Course the activity belongs to; drives the enrollment check.
    pub course_id: Uuid,
    /// Owning instructor.
    pub instructor_id: Uuid,
    pub kind: ActivityKind,
    pub quiz_kind: Option<QuizKind>,
    /// Question text shown to students.
    pub prompt: String,
    /// Ordered option list for polls and multiple-choice quizzes.
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub duration_seconds: u32,
    pub lifecycle: LifecycleEntity,
    /// Opaque token for the quick-join flow.
    pub join_token: Option<String>,
    pub created_at: SystemTime,
}

/// A single student's answer to an activity; unique per (student, activity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEntity {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub student_id: Uuid,
    pub answer: String,
    pub is_correct: Option<bool>,
    pub score: Option<u8>,
    pub points_earned: Option<u8>,
    pub submitted_at: SystemTime,
}
