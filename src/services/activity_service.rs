use std::time::SystemTime;

use rand::{Rng, distr::Alphanumeric};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        directory::{Role, UserEntity},
        models::{ActivityEntity, LifecycleEntity},
    },
    dto::activity::{ActivityView, CreateActivityRequest},
    error::ServiceError,
    services::access::{
        ensure_author, ensure_controller, ensure_enrolled, ensure_participant, is_controller,
        load_activity,
    },
    state::SharedState,
};

const JOIN_TOKEN_LEN: usize = 24;

fn join_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(JOIN_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Author a new draft activity owned by the caller.
pub async fn create_activity(
    state: &SharedState,
    user: &UserEntity,
    course_id: Uuid,
    request: CreateActivityRequest,
) -> Result<ActivityView, ServiceError> {
    ensure_author(user)?;
    request.validate()?;
    let store = state.require_activity_store().await?;

    let activity = ActivityEntity {
        id: Uuid::new_v4(),
        course_id,
        instructor_id: user.id,
        kind: request.kind,
        quiz_kind: request.quiz_kind,
        prompt: request.prompt.trim().to_string(),
        options: request
            .options
            .iter()
            .map(|option| option.trim().to_string())
            .collect(),
        correct_answer: request
            .correct_answer
            .map(|answer| answer.trim().to_string()),
        duration_seconds: request.duration_seconds,
        lifecycle: LifecycleEntity::draft(),
        join_token: Some(join_token()),
        created_at: SystemTime::now(),
    };

    store.save_activity(activity.clone()).await?;
    info!(
        activity_id = %activity.id,
        course_id = %course_id,
        kind = ?activity.kind,
        "activity created"
    );

    Ok(ActivityView::new(
        activity,
        state.config().wire_offset(),
        true,
    ))
}

/// Activities of a course; students must be enrolled and get the redacted view.
pub async fn list_course_activities(
    state: &SharedState,
    user: &UserEntity,
    course_id: Uuid,
) -> Result<Vec<ActivityView>, ServiceError> {
    if user.role == Role::Student {
        ensure_enrolled(state, user.id, course_id).await?;
    }
    let store = state.require_activity_store().await?;
    let offset = state.config().wire_offset();

    Ok(store
        .list_activities(course_id)
        .await?
        .into_iter()
        .map(|activity| {
            let privileged = is_controller(user, &activity);
            ActivityView::new(activity, offset, privileged)
        })
        .collect())
}

/// Single activity, redacted for students.
pub async fn get_activity(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<ActivityView, ServiceError> {
    let store = state.require_activity_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    ensure_participant(state, user, &activity).await?;

    let privileged = is_controller(user, &activity);
    Ok(ActivityView::new(
        activity,
        state.config().wire_offset(),
        privileged,
    ))
}

/// Resolve a quick-join token to its activity.
pub async fn join_by_token(
    state: &SharedState,
    user: &UserEntity,
    token: String,
) -> Result<ActivityView, ServiceError> {
    let store = state.require_activity_store().await?;
    let activity = store
        .find_by_join_token(token)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Invalid join link".into()))?;
    ensure_participant(state, user, &activity).await?;

    let privileged = is_controller(user, &activity);
    Ok(ActivityView::new(
        activity,
        state.config().wire_offset(),
        privileged,
    ))
}

/// Delete an activity together with its responses.
pub async fn delete_activity(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let activity = load_activity(&store, activity_id).await?;
            ensure_controller(user, &activity)?;

            if !store.delete_activity(activity_id).await? {
                return Err(ServiceError::NotFound("Activity not found".into()));
            }
            info!(activity_id = %activity_id, "activity deleted");
            Ok(())
        })
        .await?;

    state.release_activity(activity_id);
    Ok(())
}
