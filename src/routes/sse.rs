use std::convert::Infallible;

use axum::{
    Extension, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::directory::UserEntity, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/activities/{id}/events",
    tag = "realtime",
    params(("id" = String, Path, description = "Activity identifier")),
    responses((status = 200, description = "Activity event stream", content_type = "text/event-stream", body = String))
)]
/// Stream the lifecycle and submission events of one activity.
pub async fn activity_stream(
    State(state): State<SharedState>,
    Extension(user): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let receiver = sse_service::subscribe_activity(&state, id).await?;
    info!(activity_id = %id, user_id = %user.id, "new activity SSE connection");
    Ok(sse_service::to_sse_stream(state, id, receiver))
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/activities/{id}/events", get(activity_stream))
}
