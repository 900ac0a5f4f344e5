mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use classpulse_back::{
    dao::{
        activity_store::{ActivityStore, memory::MemoryActivityStore},
        models::{ActivityEntity, LifecycleEntity, LifecycleStateEntity, ResponseEntity},
        storage::{CasOutcome, RecordOutcome, StorageError, StorageResult},
    },
    dto::{
        lifecycle::ActivityStatus,
        ws::{ServerMessage, UpdateType},
    },
    services::lifecycle_service,
};
use futures::future::{BoxFuture, FutureExt};
use tokio::time::sleep;
use uuid::Uuid;

use common::{Classroom, poll};

/// Memory store that refuses the first lifecycle write ending a run.
struct RefusesFirstEnd {
    inner: MemoryActivityStore,
    refused: AtomicBool,
}

impl RefusesFirstEnd {
    fn new() -> Self {
        Self {
            inner: MemoryActivityStore::new(),
            refused: AtomicBool::new(false),
        }
    }
}

impl ActivityStore for RefusesFirstEnd {
    fn save_activity(&self, activity: ActivityEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_activity(activity)
    }

    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        self.inner.find_activity(id)
    }

    fn find_by_join_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        self.inner.find_by_join_token(token)
    }

    fn list_activities(
        &self,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        self.inner.list_activities(course_id)
    }

    fn list_running(&self) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        self.inner.list_running()
    }

    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_activity(id)
    }

    fn compare_and_set_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        if next.state == LifecycleStateEntity::Ended && !self.refused.swap(true, Ordering::SeqCst)
        {
            let err = StorageError::unavailable(
                "write refused".into(),
                std::io::Error::other("connection reset"),
            );
            return async move { Err(err) }.boxed();
        }
        self.inner.compare_and_set_lifecycle(id, expected, next)
    }

    fn reset_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        self.inner.reset_lifecycle(id, expected, next)
    }

    fn record_response(
        &self,
        response: ResponseEntity,
        start_epoch: u64,
    ) -> BoxFuture<'static, StorageResult<RecordOutcome>> {
        self.inner.record_response(response, start_epoch)
    }

    fn find_response(
        &self,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>> {
        self.inner.find_response(activity_id, student_id)
    }

    fn list_responses(
        &self,
        activity_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        self.inner.list_responses(activity_id)
    }

    fn count_responses(&self, activity_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        self.inner.count_responses(activity_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test(start_paused = true)]
async fn failed_expiry_write_is_retried() {
    let room = Classroom::new().await;
    let store = Arc::new(RefusesFirstEnd::new());
    room.state.set_activity_store(store.clone()).await;

    let id = room.create(poll(&["A", "B"], 1)).await;
    let mut rx = room.state.rooms().subscribe(id);
    lifecycle_service::start(&room.state, &room.instructor, id)
        .await
        .unwrap();

    sleep(Duration::from_secs(10)).await;
    assert!(store.refused.load(Ordering::SeqCst));

    let ActivityStatus::Staff(status) =
        lifecycle_service::status(&room.state, &room.instructor, id)
            .await
            .unwrap()
    else {
        panic!("instructor received the student view");
    };
    assert!(!status.is_active);
    assert!(room.state.expiries().is_empty());

    let mut updates = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let ServerMessage::ActivityUpdate { update_type, .. } = message {
            updates.push(update_type);
        }
    }
    assert_eq!(updates, vec![UpdateType::Started, UpdateType::AutoEnded]);
}
