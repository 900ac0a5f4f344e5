use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::UtcOffset;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{ActivityEntity, ActivityKind, LifecycleStateEntity, QuizKind},
    dto::{format_system_time, validation::validate_activity_shape},
};

/// Payload used to author a new activity in a course.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateActivityRequest {
    pub kind: ActivityKind,
    #[serde(default)]
    pub quiz_kind: Option<QuizKind>,
    pub prompt: String,
    /// Ordered options for polls and multiple-choice quizzes.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    pub duration_seconds: u32,
}

impl Validate for CreateActivityRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_activity_shape(self)
    }
}

/// Activity as returned to API clients.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub instructor_id: Uuid,
    pub kind: ActivityKind,
    pub quiz_kind: Option<QuizKind>,
    pub prompt: String,
    pub options: Vec<String>,
    /// Omitted for students.
    pub correct_answer: Option<String>,
    pub duration_seconds: u32,
    pub state: LifecycleStateEntity,
    pub is_active: bool,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub will_end_at: Option<String>,
    /// Omitted for students.
    pub join_token: Option<String>,
    pub created_at: String,
}

impl ActivityView {
    /// Build the view; `privileged` exposes the answer key and join token.
    pub fn new(activity: ActivityEntity, offset: UtcOffset, privileged: bool) -> Self {
        let lifecycle = &activity.lifecycle;
        let is_active = lifecycle.state == LifecycleStateEntity::Running;
        let will_end_at = is_active
            .then_some(lifecycle.started_at)
            .flatten()
            .map(|started| started + Duration::from_secs(u64::from(activity.duration_seconds)));

        Self {
            id: activity.id,
            course_id: activity.course_id,
            instructor_id: activity.instructor_id,
            kind: activity.kind,
            quiz_kind: activity.quiz_kind,
            prompt: activity.prompt,
            options: activity.options,
            correct_answer: activity.correct_answer.filter(|_| privileged),
            duration_seconds: activity.duration_seconds,
            state: lifecycle.state,
            is_active,
            started_at: lifecycle.started_at.map(|t| format_system_time(t, offset)),
            ended_at: lifecycle.ended_at.map(|t| format_system_time(t, offset)),
            will_end_at: will_end_at.map(|t| format_system_time(t, offset)),
            join_token: activity.join_token.filter(|_| privileged),
            created_at: format_system_time(activity.created_at, offset),
        }
    }
}
