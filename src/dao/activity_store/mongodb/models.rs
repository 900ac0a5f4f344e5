use std::time::SystemTime;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    ActivityEntity, ActivityKind, LifecycleEntity, LifecycleStateEntity, QuizKind, ResponseEntity,
};

pub const ACTIVITY_COLLECTION: &str = "activities";
pub const RESPONSE_COLLECTION: &str = "responses";

/// Identifiers are stored as hyphenated strings so filters never depend on
/// the binary subtype chosen by the serializer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoActivityDocument {
    #[serde(rename = "_id")]
    id: String,
    course_id: String,
    instructor_id: String,
    kind: ActivityKind,
    quiz_kind: Option<QuizKind>,
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: Option<String>,
    duration_seconds: i64,
    state: LifecycleStateEntity,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
    #[serde(default)]
    start_epoch: i64,
    join_token: Option<String>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoResponseDocument {
    #[serde(rename = "_id")]
    id: String,
    activity_id: String,
    student_id: String,
    answer: String,
    is_correct: Option<bool>,
    score: Option<i32>,
    points_earned: Option<i32>,
    submitted_at: DateTime,
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn response_key(activity_id: Uuid, student_id: Uuid) -> Document {
    doc! {
        "activity_id": activity_id.to_string(),
        "student_id": student_id.to_string(),
    }
}

pub fn optional_datetime(value: Option<SystemTime>) -> Option<DateTime> {
    value.map(DateTime::from_system_time)
}

/// `$set` body writing every lifecycle column at once.
pub fn lifecycle_update(next: &LifecycleEntity) -> Document {
    doc! {
        "$set": {
            "state": next.state.as_str(),
            "started_at": optional_datetime(next.started_at),
            "ended_at": optional_datetime(next.ended_at),
            "start_epoch": next.start_epoch as i64,
        }
    }
}

/// Filter matching an activity only while its lifecycle equals `expected`.
pub fn lifecycle_guard(id: Uuid, expected: &LifecycleEntity) -> Document {
    doc! {
        "_id": id.to_string(),
        "state": expected.state.as_str(),
        "start_epoch": expected.start_epoch as i64,
        "started_at": optional_datetime(expected.started_at),
        "ended_at": optional_datetime(expected.ended_at),
    }
}

fn parse_id(collection: &'static str, field: &str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|err| MongoDaoError::CorruptDocument {
        collection,
        reason: format!("invalid `{field}`: {err}"),
    })
}

impl From<ActivityEntity> for MongoActivityDocument {
    fn from(value: ActivityEntity) -> Self {
        Self {
            id: value.id.to_string(),
            course_id: value.course_id.to_string(),
            instructor_id: value.instructor_id.to_string(),
            kind: value.kind,
            quiz_kind: value.quiz_kind,
            prompt: value.prompt,
            options: value.options,
            correct_answer: value.correct_answer,
            duration_seconds: i64::from(value.duration_seconds),
            state: value.lifecycle.state,
            started_at: optional_datetime(value.lifecycle.started_at),
            ended_at: optional_datetime(value.lifecycle.ended_at),
            start_epoch: value.lifecycle.start_epoch as i64,
            join_token: value.join_token,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoActivityDocument> for ActivityEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoActivityDocument) -> Result<Self, Self::Error> {
        let duration_seconds =
            u32::try_from(value.duration_seconds).map_err(|_| MongoDaoError::CorruptDocument {
                collection: ACTIVITY_COLLECTION,
                reason: format!("duration `{}` out of range", value.duration_seconds),
            })?;

        Ok(Self {
            id: parse_id(ACTIVITY_COLLECTION, "_id", &value.id)?,
            course_id: parse_id(ACTIVITY_COLLECTION, "course_id", &value.course_id)?,
            instructor_id: parse_id(ACTIVITY_COLLECTION, "instructor_id", &value.instructor_id)?,
            kind: value.kind,
            quiz_kind: value.quiz_kind,
            prompt: value.prompt,
            options: value.options,
            correct_answer: value.correct_answer,
            duration_seconds,
            lifecycle: LifecycleEntity {
                state: value.state,
                started_at: value.started_at.map(DateTime::to_system_time),
                ended_at: value.ended_at.map(DateTime::to_system_time),
                start_epoch: value.start_epoch.max(0) as u64,
            },
            join_token: value.join_token,
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<ResponseEntity> for MongoResponseDocument {
    fn from(value: ResponseEntity) -> Self {
        Self {
            id: value.id.to_string(),
            activity_id: value.activity_id.to_string(),
            student_id: value.student_id.to_string(),
            answer: value.answer,
            is_correct: value.is_correct,
            score: value.score.map(i32::from),
            points_earned: value.points_earned.map(i32::from),
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl TryFrom<MongoResponseDocument> for ResponseEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoResponseDocument) -> Result<Self, Self::Error> {
        let narrow = |field: &str, raw: Option<i32>| -> MongoResult<Option<u8>> {
            raw.map(|value| {
                u8::try_from(value).map_err(|_| MongoDaoError::CorruptDocument {
                    collection: RESPONSE_COLLECTION,
                    reason: format!("`{field}` out of range: {value}"),
                })
            })
            .transpose()
        };

        Ok(Self {
            id: parse_id(RESPONSE_COLLECTION, "_id", &value.id)?,
            activity_id: parse_id(RESPONSE_COLLECTION, "activity_id", &value.activity_id)?,
            student_id: parse_id(RESPONSE_COLLECTION, "student_id", &value.student_id)?,
            answer: value.answer,
            is_correct: value.is_correct,
            score: narrow("score", value.score)?,
            points_earned: narrow("points_earned", value.points_earned)?,
            submitted_at: value.submitted_at.to_system_time(),
        })
    }
}
