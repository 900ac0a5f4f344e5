use std::sync::Arc;

use uuid::Uuid;

use crate::{
    dao::{
        activity_store::ActivityStore,
        directory::{Role, UserEntity},
        models::ActivityEntity,
    },
    error::ServiceError,
    state::SharedState,
};

/// Load an activity or fail with `NotFound`.
pub async fn load_activity(
    store: &Arc<dyn ActivityStore>,
    activity_id: Uuid,
) -> Result<ActivityEntity, ServiceError> {
    store
        .find_activity(activity_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Activity not found".into()))
}

/// Admins, and the instructor owning the activity.
pub fn is_controller(user: &UserEntity, activity: &ActivityEntity) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Instructor => user.id == activity.instructor_id,
        Role::Student => false,
    }
}

/// Gate for start, stop, reset, delete, export and results.
pub fn ensure_controller(user: &UserEntity, activity: &ActivityEntity) -> Result<(), ServiceError> {
    if is_controller(user, activity) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// Only staff may author activities.
pub fn ensure_author(user: &UserEntity) -> Result<(), ServiceError> {
    match user.role {
        Role::Admin | Role::Instructor => Ok(()),
        Role::Student => Err(ServiceError::Forbidden),
    }
}

/// Fails with `NotEnrolled` unless the student belongs to the course.
pub async fn ensure_enrolled(
    state: &SharedState,
    student_id: Uuid,
    course_id: Uuid,
) -> Result<(), ServiceError> {
    if state
        .directory()
        .is_enrolled(student_id, course_id)
        .await?
    {
        Ok(())
    } else {
        Err(ServiceError::NotEnrolled)
    }
}

/// Controllers, plus students enrolled in the activity's course.
pub async fn ensure_participant(
    state: &SharedState,
    user: &UserEntity,
    activity: &ActivityEntity,
) -> Result<(), ServiceError> {
    if is_controller(user, activity) {
        return Ok(());
    }
    match user.role {
        Role::Student => ensure_enrolled(state, user.id, activity.course_id).await,
        _ => Err(ServiceError::Forbidden),
    }
}
