use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::{
    error::ServiceError,
    services::expiry_service,
    state::{SharedState, lifecycle::Lifecycle},
};

/// Re-arm one expiry timer per running activity for its remaining slack.
///
/// Timers live in memory only, so after a restart (or a storage reconnect) a
/// running activity would otherwise never end. Overdue activities get a zero
/// delay. Returns the number of timers armed.
pub async fn rearm_running(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_activity_store().await?;
    let running = store.list_running().await?;
    let now = SystemTime::now();
    let mut armed = 0;

    for activity in running {
        let lifecycle = match Lifecycle::try_from(&activity.lifecycle) {
            Ok(lifecycle) => lifecycle,
            Err(err) => {
                warn!(activity_id = %activity.id, error = %err, "skipping unreadable running activity");
                continue;
            }
        };
        if state
            .expiries()
            .get(activity.id)
            .is_some_and(|pending| pending.epoch == lifecycle.epoch())
        {
            continue;
        }

        let duration = Duration::from_secs(u64::from(activity.duration_seconds));
        let remaining = lifecycle
            .will_end_at(duration)
            .and_then(|deadline| deadline.duration_since(now).ok())
            .unwrap_or(Duration::ZERO);
        expiry_service::arm(state, activity.id, lifecycle.epoch(), remaining);
        armed += 1;
    }

    if armed > 0 {
        info!(armed, "re-armed expiry timers for running activities");
    }
    Ok(armed)
}
