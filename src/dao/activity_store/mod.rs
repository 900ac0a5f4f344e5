pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{ActivityEntity, LifecycleEntity, ResponseEntity};
use crate::dao::storage::{CasOutcome, RecordOutcome, StorageResult};
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for activities and their responses.
///
/// Lifecycle writes are compare-and-set: the caller passes the lifecycle it read
/// and the one it wants, and the backend only writes when the stored value still
/// matches. Response writes are keyed on `(student_id, activity_id)`.
pub trait ActivityStore: Send + Sync {
    fn save_activity(&self, activity: ActivityEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>>;
    fn find_by_join_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>>;
    fn list_activities(
        &self,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>>;
    fn list_running(&self) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>>;
    /// Remove an activity and every response it owns.
    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn compare_and_set_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Same as [`ActivityStore::compare_and_set_lifecycle`] but also drops every
    /// response of the activity when the write applies.
    fn reset_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Insert or overwrite the student's response, provided the activity is
    /// running at `start_epoch`.
    fn record_response(
        &self,
        response: ResponseEntity,
        start_epoch: u64,
    ) -> BoxFuture<'static, StorageResult<RecordOutcome>>;
    fn find_response(
        &self,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>>;
    fn list_responses(
        &self,
        activity_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>>;
    fn count_responses(&self, activity_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
