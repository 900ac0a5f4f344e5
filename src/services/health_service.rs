use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage reachability and live room/timer counts.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_activity_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(
        state.is_degraded().await,
        state.rooms().open_rooms(),
        state.expiries().len(),
    )
}
