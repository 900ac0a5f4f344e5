//! Process-local activity store. Each activity row and its responses live behind
//! one map entry, so every operation on an activity is atomic.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::{
    activity_store::ActivityStore,
    models::{ActivityEntity, LifecycleEntity, LifecycleStateEntity, ResponseEntity},
    storage::{CasOutcome, RecordOutcome, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryActivityStore {
    inner: Arc<DashMap<Uuid, ActivityRecord>>,
}

struct ActivityRecord {
    activity: ActivityEntity,
    /// Responses keyed by student, in first-submission order.
    responses: IndexMap<Uuid, ResponseEntity>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn compare_and_set(
        &self,
        id: Uuid,
        expected: &LifecycleEntity,
        next: LifecycleEntity,
        purge_responses: bool,
    ) -> CasOutcome {
        let Some(mut record) = self.inner.get_mut(&id) else {
            return CasOutcome::Missing;
        };
        if record.activity.lifecycle != *expected {
            return CasOutcome::Conflict;
        }
        record.activity.lifecycle = next;
        if purge_responses {
            record.responses.clear();
        }
        CasOutcome::Applied
    }

    fn record(&self, response: ResponseEntity, start_epoch: u64) -> RecordOutcome {
        let Some(mut record) = self.inner.get_mut(&response.activity_id) else {
            return RecordOutcome::ActivityMissing;
        };
        let lifecycle = &record.activity.lifecycle;
        if lifecycle.state != LifecycleStateEntity::Running || lifecycle.start_epoch != start_epoch
        {
            return RecordOutcome::NotRunning;
        }

        match record.responses.get_mut(&response.student_id) {
            Some(existing) => {
                // The row keeps its identity; only the answer side changes.
                existing.answer = response.answer;
                existing.is_correct = response.is_correct;
                existing.score = response.score;
                existing.points_earned = response.points_earned;
                existing.submitted_at = response.submitted_at;
                RecordOutcome::Replaced {
                    response_count: record.responses.len() as u64,
                }
            }
            None => {
                record.responses.insert(response.student_id, response);
                RecordOutcome::Inserted {
                    response_count: record.responses.len() as u64,
                }
            }
        }
    }
}

impl ActivityStore for MemoryActivityStore {
    fn save_activity(&self, activity: ActivityEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.entry(activity.id) {
                Entry::Occupied(mut entry) => entry.get_mut().activity = activity,
                Entry::Vacant(entry) => {
                    entry.insert(ActivityRecord {
                        activity,
                        responses: IndexMap::new(),
                    });
                }
            }
            Ok(())
        })
    }

    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .get(&id)
                .map(|record| record.activity.clone()))
        })
    }

    fn find_by_join_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .iter()
                .find(|record| record.activity.join_token.as_deref() == Some(token.as_str()))
                .map(|record| record.activity.clone()))
        })
    }

    fn list_activities(
        &self,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut activities: Vec<ActivityEntity> = store
                .inner
                .iter()
                .filter(|record| record.activity.course_id == course_id)
                .map(|record| record.activity.clone())
                .collect();
            activities.sort_by_key(|activity| activity.created_at);
            Ok(activities)
        })
    }

    fn list_running(&self) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .iter()
                .filter(|record| record.activity.lifecycle.state == LifecycleStateEntity::Running)
                .map(|record| record.activity.clone())
                .collect())
        })
    }

    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.remove(&id).is_some()) })
    }

    fn compare_and_set_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.compare_and_set(id, &expected, next, false)) })
    }

    fn reset_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.compare_and_set(id, &expected, next, true)) })
    }

    fn record_response(
        &self,
        response: ResponseEntity,
        start_epoch: u64,
    ) -> BoxFuture<'static, StorageResult<RecordOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.record(response, start_epoch)) })
    }

    fn find_response(
        &self,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .get(&activity_id)
                .and_then(|record| record.responses.get(&student_id).cloned()))
        })
    }

    fn list_responses(
        &self,
        activity_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .get(&activity_id)
                .map(|record| record.responses.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn count_responses(&self, activity_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .get(&activity_id)
                .map(|record| record.responses.len() as u64)
                .unwrap_or(0))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::ActivityKind;

    fn activity() -> ActivityEntity {
        ActivityEntity {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            kind: ActivityKind::Poll,
            quiz_kind: None,
            prompt: "Pick one".into(),
            options: vec!["A".into(), "B".into()],
            correct_answer: None,
            duration_seconds: 30,
            lifecycle: LifecycleEntity::draft(),
            join_token: Some("join-me".into()),
            created_at: SystemTime::now(),
        }
    }

    fn running(epoch: u64) -> LifecycleEntity {
        LifecycleEntity {
            state: LifecycleStateEntity::Running,
            started_at: Some(SystemTime::now()),
            ended_at: None,
            start_epoch: epoch,
        }
    }

    fn response(activity_id: Uuid, student_id: Uuid, answer: &str) -> ResponseEntity {
        ResponseEntity {
            id: Uuid::new_v4(),
            activity_id,
            student_id,
            answer: answer.into(),
            is_correct: None,
            score: None,
            points_earned: None,
            submitted_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn compare_and_set_rejects_stale_expectation() {
        let store = MemoryActivityStore::new();
        let activity = activity();
        store.save_activity(activity.clone()).await.unwrap();

        let next = running(1);
        let outcome = store
            .compare_and_set_lifecycle(activity.id, LifecycleEntity::draft(), next.clone())
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Applied);

        let outcome = store
            .compare_and_set_lifecycle(activity.id, LifecycleEntity::draft(), running(2))
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);

        let stored = store.find_activity(activity.id).await.unwrap().unwrap();
        assert_eq!(stored.lifecycle, next);
    }

    #[tokio::test]
    async fn compare_and_set_on_unknown_activity_is_missing() {
        let store = MemoryActivityStore::new();
        let outcome = store
            .compare_and_set_lifecycle(Uuid::new_v4(), LifecycleEntity::draft(), running(1))
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Missing);
    }

    #[tokio::test]
    async fn second_response_from_same_student_replaces_first() {
        let store = MemoryActivityStore::new();
        let mut activity = activity();
        activity.lifecycle = running(1);
        store.save_activity(activity.clone()).await.unwrap();
        let student = Uuid::new_v4();

        let first = store
            .record_response(response(activity.id, student, "A"), 1)
            .await
            .unwrap();
        assert_eq!(first, RecordOutcome::Inserted { response_count: 1 });

        let second = store
            .record_response(response(activity.id, student, "B"), 1)
            .await
            .unwrap();
        assert_eq!(second, RecordOutcome::Replaced { response_count: 1 });

        let responses = store.list_responses(activity.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].answer, "B");
    }

    #[tokio::test]
    async fn responses_are_refused_outside_the_running_epoch() {
        let store = MemoryActivityStore::new();
        let mut activity = activity();
        activity.lifecycle = running(3);
        store.save_activity(activity.clone()).await.unwrap();

        let outcome = store
            .record_response(response(activity.id, Uuid::new_v4(), "A"), 2)
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::NotRunning);

        let outcome = store
            .record_response(response(Uuid::new_v4(), Uuid::new_v4(), "A"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::ActivityMissing);
    }

    #[tokio::test]
    async fn reset_and_delete_drop_responses() {
        let store = MemoryActivityStore::new();
        let mut activity = activity();
        activity.lifecycle = running(1);
        store.save_activity(activity.clone()).await.unwrap();
        store
            .record_response(response(activity.id, Uuid::new_v4(), "A"), 1)
            .await
            .unwrap();

        let mut draft = LifecycleEntity::draft();
        draft.start_epoch = 1;
        let outcome = store
            .reset_lifecycle(activity.id, activity.lifecycle.clone(), draft)
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Applied);
        assert_eq!(store.count_responses(activity.id).await.unwrap(), 0);

        assert!(store.delete_activity(activity.id).await.unwrap());
        assert!(store.find_activity(activity.id).await.unwrap().is_none());
        assert!(!store.delete_activity(activity.id).await.unwrap());
    }

    #[tokio::test]
    async fn join_token_lookup_and_course_listing() {
        let store = MemoryActivityStore::new();
        let activity = activity();
        store.save_activity(activity.clone()).await.unwrap();

        let found = store
            .find_by_join_token("join-me".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, activity.id);
        assert!(
            store
                .find_by_join_token("nope".into())
                .await
                .unwrap()
                .is_none()
        );

        let listed = store.list_activities(activity.course_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.list_running().await.unwrap().is_empty());
    }
}
