use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{activity_store::ActivityStore, storage::StorageError},
    services::recovery,
    state::SharedState,
};

const HEALTH_INTERVAL: Duration = Duration::from_secs(5);
/// In-place reconnects tried before the store is dropped and rebuilt.
const RECONNECT_ATTEMPTS: u32 = 3;

/// Doubling delay between attempts, capped.
pub(crate) struct Backoff {
    initial: Duration,
    current: Duration,
    cap: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self::between(Duration::from_secs(1), Duration::from_secs(10))
    }

    pub(crate) fn between(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            current: initial,
            cap,
        }
    }

    pub(crate) async fn wait(&mut self) {
        sleep(self.current).await;
        self.current = (self.current * 2).min(self.cap);
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Keep an activity store installed in the shared state.
///
/// The service is degraded until `connect` first succeeds and again whenever
/// the store stops answering health checks. Each time a store becomes usable
/// the expiry timers of running activities are re-armed.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ActivityStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "activity store connection failed");
                backoff.wait().await;
                continue;
            }
        };

        backoff.reset();
        state.set_activity_store(store.clone()).await;
        info!("activity store installed; leaving degraded mode");
        rearm(&state).await;

        watch_store(&state, &*store).await;
        error!("activity store lost; rebuilding connection");
        backoff.wait().await;
    }
}

/// Health-check the store until it is lost for good.
async fn watch_store(state: &SharedState, store: &dyn ActivityStore) {
    loop {
        sleep(HEALTH_INTERVAL).await;
        let Err(err) = store.health_check().await else {
            continue;
        };

        warn!(error = %err, "activity store health check failed; entering degraded mode");
        state.update_degraded(true).await;
        if !reconnect(store).await {
            return;
        }

        info!("activity store reconnected; leaving degraded mode");
        state.update_degraded(false).await;
        rearm(state).await;
    }
}

async fn reconnect(store: &dyn ActivityStore) -> bool {
    let mut backoff = Backoff::new();
    for attempt in 1..=RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "activity store reconnect failed");
                backoff.wait().await;
            }
        }
    }
    false
}

/// Re-arm expiry timers after the store becomes reachable.
async fn rearm(state: &SharedState) {
    if let Err(err) = recovery::rearm_running(state).await {
        warn!(error = %err, "failed to re-arm expiry timers");
    }
}
