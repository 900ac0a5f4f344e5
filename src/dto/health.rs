use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: &'static str,
    /// Activity rooms with at least one live subscriber.
    pub open_rooms: usize,
    /// Expiry timers currently armed.
    pub pending_expiries: usize,
}

impl HealthResponse {
    pub fn new(degraded: bool, open_rooms: usize, pending_expiries: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" },
            open_rooms,
            pending_expiries,
        }
    }
}
