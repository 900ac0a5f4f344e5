use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::ActivityEntity,
    services::{lifecycle_service, storage_supervisor::Backoff},
    state::{PendingExpiry, SharedState, lifecycle::Lifecycle},
};

const RETRY_INITIAL: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(30);

/// Arm the one-shot timer for the run that `lifecycle` just started.
pub fn schedule(state: &SharedState, activity: &ActivityEntity, lifecycle: &Lifecycle) {
    let duration = Duration::from_secs(u64::from(activity.duration_seconds));
    arm(state, activity.id, lifecycle.epoch(), duration);
}

/// Spawn a task that sleeps for `delay`, then ends the activity if it is still
/// running at `epoch`.
///
/// Earlier timers of the same activity are left sleeping; they see a newer
/// epoch (or a non-running activity) when they wake and exit without effect.
/// A failed expiry is retried with backoff for as long as this epoch is still
/// the armed one.
pub fn arm(state: &SharedState, activity_id: Uuid, epoch: u64, delay: Duration) {
    state.expiries().arm(
        activity_id,
        PendingExpiry {
            epoch,
            deadline: SystemTime::now() + delay,
        },
    );
    debug!(activity_id = %activity_id, epoch, delay_ms = delay.as_millis() as u64, "expiry armed");

    let state = state.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        let mut backoff = Backoff::between(RETRY_INITIAL, RETRY_CAP);
        loop {
            match lifecycle_service::expire(&state, activity_id, epoch).await {
                Ok(_) => break,
                Err(err) => {
                    warn!(activity_id = %activity_id, epoch, error = %err, "expiry could not be applied; retrying");
                }
            }
            backoff.wait().await;
            if !is_current(&state, activity_id, epoch) {
                debug!(activity_id = %activity_id, epoch, "expiry retry superseded");
                break;
            }
        }
        state.expiries().disarm(activity_id, epoch);
    });
}

fn is_current(state: &SharedState, activity_id: Uuid, epoch: u64) -> bool {
    state
        .expiries()
        .get(activity_id)
        .is_some_and(|pending| pending.epoch == epoch)
}
