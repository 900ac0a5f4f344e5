use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dao::directory::UserEntity, dto::activity::ActivityView, error::AppError,
    services::activity_service, state::SharedState,
};

/// Quick-join links.
pub fn router() -> Router<SharedState> {
    Router::new().route("/join/{token}", get(join_activity))
}

/// Resolve a join token to its activity.
#[utoipa::path(
    get,
    path = "/join/{token}",
    tag = "activities",
    params(("token" = String, Path, description = "Join token shared by the instructor")),
    responses(
        (status = 200, description = "Activity behind the link", body = ActivityView),
        (status = 404, description = "Invalid join link")
    )
)]
pub async fn join_activity(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(token): Path<String>,
) -> Result<Json<ActivityView>, AppError> {
    Ok(Json(activity_service::join_by_token(&state, &user, token).await?))
}
