use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dao::directory::UserEntity,
    dto::activity::{ActivityView, CreateActivityRequest},
    error::AppError,
    services::activity_service,
    state::SharedState,
};

/// Activity authoring and listing within a course.
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/courses/{course_id}/activities",
        get(list_activities).post(create_activity),
    )
}

/// Author a new draft activity.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/activities",
    tag = "activities",
    params(("course_id" = String, Path, description = "Course identifier")),
    request_body = CreateActivityRequest,
    responses(
        (status = 200, description = "Activity created", body = ActivityView),
        (status = 400, description = "Invalid activity definition")
    )
)]
pub async fn create_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<Json<ActivityView>, AppError> {
    let view = activity_service::create_activity(&state, &user, course_id, payload).await?;
    Ok(Json(view))
}

/// List the activities of a course.
#[utoipa::path(
    get,
    path = "/courses/{course_id}/activities",
    tag = "activities",
    params(("course_id" = String, Path, description = "Course identifier")),
    responses((status = 200, description = "Course activities", body = [ActivityView]))
)]
pub async fn list_activities(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<ActivityView>>, AppError> {
    Ok(Json(
        activity_service::list_course_activities(&state, &user, course_id).await?,
    ))
}
