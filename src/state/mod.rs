pub mod expiry;
pub mod lifecycle;
pub mod rooms;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{activity_store::ActivityStore, directory::Directory},
    error::ServiceError,
};

pub use self::expiry::{ExpiryRegistry, PendingExpiry};
pub use self::rooms::ActivityRooms;

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, identity directory, activity rooms
/// and armed expiry timers.
pub struct AppState {
    config: Arc<AppConfig>,
    activity_store: RwLock<Option<Arc<dyn ActivityStore>>>,
    directory: Arc<dyn Directory>,
    rooms: ActivityRooms,
    expiries: ExpiryRegistry,
    gates: DashMap<Uuid, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, directory: Arc<dyn Directory>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            rooms: ActivityRooms::new(config.room_capacity()),
            transition_timeout: config.transition_timeout(),
            config: Arc::new(config),
            activity_store: RwLock::new(None),
            directory,
            expiries: ExpiryRegistry::default(),
            gates: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn directory(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }

    /// Broadcast rooms, one per activity.
    pub fn rooms(&self) -> &ActivityRooms {
        &self.rooms
    }

    /// Expiry timers armed by the scheduler.
    pub fn expiries(&self) -> &ExpiryRegistry {
        &self.expiries
    }

    /// Obtain a handle to the current activity store, if one is installed.
    pub async fn activity_store(&self) -> Option<Arc<dyn ActivityStore>> {
        let guard = self.activity_store.read().await;
        guard.as_ref().cloned()
    }

    /// Activity store for request handling; fails while degraded.
    pub async fn require_activity_store(&self) -> Result<Arc<dyn ActivityStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.activity_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new activity store implementation and leave degraded mode.
    pub async fn set_activity_store(&self, store: Arc<dyn ActivityStore>) {
        {
            let mut guard = self.activity_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Run `work` while holding the activity's gate.
    ///
    /// Every lifecycle change and submission for one activity goes through its
    /// gate, so the store write and the matching room event are never
    /// interleaved with another operation on the same activity.
    pub async fn run_gated<F, Fut, T>(&self, activity_id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.gates.entry(activity_id).or_default().clone();
        let result = {
            let _guard = gate.lock().await;

            let work_future = work();
            match self.transition_timeout {
                Some(limit) => match timeout(limit, work_future).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(activity_id = %activity_id, "gated operation timed out");
                        Err(ServiceError::Timeout)
                    }
                },
                None => work_future.await,
            }
        };

        // Only the map still holds the gate once no caller waits on it.
        drop(gate);
        self.gates
            .remove_if(&activity_id, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    /// Forget per-activity bookkeeping once the activity is deleted.
    pub fn release_activity(&self, activity_id: Uuid) {
        self.gates.remove(&activity_id);
        self.expiries.clear(activity_id);
        self.rooms.prune(activity_id);
    }
}
