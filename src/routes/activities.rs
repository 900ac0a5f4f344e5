use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dao::directory::UserEntity,
    dto::{
        activity::ActivityView,
        lifecycle::{ActionResponse, ActivityStatus, StartResponse, SubmitRequest},
        results::ActivityResults,
    },
    error::AppError,
    services::{activity_service, export, lifecycle_service, results},
    state::SharedState,
};

/// Lifecycle, submission and reporting endpoints of a single activity.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/activities/{id}",
            get(get_activity).delete(delete_activity),
        )
        .route("/activities/{id}/start", post(start_activity))
        .route("/activities/{id}/stop", post(stop_activity))
        .route("/activities/{id}/reset", post(reset_activity))
        .route("/activities/{id}/submit", post(submit_response))
        .route("/activities/{id}/status", get(activity_status))
        .route("/activities/{id}/results", get(activity_results))
        .route("/activities/{id}/export", get(export_responses))
}

/// Fetch one activity; students receive the redacted view.
#[utoipa::path(
    get,
    path = "/activities/{id}",
    tag = "activities",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity", body = ActivityView))
)]
pub async fn get_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivityView>, AppError> {
    Ok(Json(activity_service::get_activity(&state, &user, id).await?))
}

/// Delete an activity and its responses.
#[utoipa::path(
    delete,
    path = "/activities/{id}",
    tag = "activities",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity deleted", body = ActionResponse))
)]
pub async fn delete_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    activity_service::delete_activity(&state, &user, id).await?;
    Ok(Json(ActionResponse::ok("Activity deleted")))
}

/// Start (or restart) the activity timer.
#[utoipa::path(
    post,
    path = "/activities/{id}/start",
    tag = "lifecycle",
    params(("id" = String, Path, description = "Activity identifier")),
    responses(
        (status = 200, description = "Activity started", body = StartResponse),
        (status = 403, description = "Insufficient permissions")
    )
)]
pub async fn start_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartResponse>, AppError> {
    Ok(Json(lifecycle_service::start(&state, &user, id).await?))
}

/// End a running activity immediately.
#[utoipa::path(
    post,
    path = "/activities/{id}/stop",
    tag = "lifecycle",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity stopped", body = ActionResponse))
)]
pub async fn stop_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(lifecycle_service::stop(&state, &user, id).await?))
}

/// Return the activity to draft, deleting all responses.
#[utoipa::path(
    post,
    path = "/activities/{id}/reset",
    tag = "lifecycle",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity reset", body = ActionResponse))
)]
pub async fn reset_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(lifecycle_service::reset(&state, &user, id).await?))
}

/// Submit (or replace) the caller's answer.
#[utoipa::path(
    post,
    path = "/activities/{id}/submit",
    tag = "lifecycle",
    params(("id" = String, Path, description = "Activity identifier")),
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Response recorded", body = ActionResponse),
        (status = 400, description = "Activity not running or empty answer"),
        (status = 403, description = "Not enrolled")
    )
)]
pub async fn submit_response(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        lifecycle_service::submit(&state, &user, id, payload).await?,
    ))
}

/// Role-dependent lifecycle status.
#[utoipa::path(
    get,
    path = "/activities/{id}/status",
    tag = "lifecycle",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity status", body = ActivityStatus))
)]
pub async fn activity_status(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivityStatus>, AppError> {
    Ok(Json(lifecycle_service::status(&state, &user, id).await?))
}

/// Aggregated results, shaped by activity kind.
#[utoipa::path(
    get,
    path = "/activities/{id}/results",
    tag = "results",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Aggregated results", body = ActivityResults))
)]
pub async fn activity_results(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivityResults>, AppError> {
    Ok(Json(results::activity_results(&state, &user, id).await?))
}

/// Download every response as CSV.
#[utoipa::path(
    get,
    path = "/activities/{id}/export",
    tag = "results",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "CSV export", content_type = "text/csv", body = String))
)]
pub async fn export_responses(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let csv = export::export_responses(&state, &user, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", csv.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv.body,
    ))
}
