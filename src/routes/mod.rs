use axum::{Router, middleware};

use crate::state::SharedState;

pub mod activities;
pub mod auth;
pub mod courses;
pub mod docs;
pub mod health;
pub mod join;
pub mod sse;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// Everything except the health check and the documentation requires an
/// authenticated caller.
pub fn router(state: SharedState) -> Router<()> {
    let protected = activities::router()
        .merge(courses::router())
        .merge(join::router())
        .merge(sse::router())
        .merge(websocket::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let docs_router = docs::router(state.clone());

    health::router()
        .merge(protected)
        .merge(docs_router)
        .with_state(state)
}
