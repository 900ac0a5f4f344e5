use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        ACTIVITY_COLLECTION, MongoActivityDocument, MongoResponseDocument, RESPONSE_COLLECTION,
        doc_id, lifecycle_guard, lifecycle_update, response_key,
    },
};
use crate::dao::{
    activity_store::ActivityStore,
    models::{ActivityEntity, LifecycleEntity, LifecycleStateEntity, ResponseEntity},
    storage::{CasOutcome, RecordOutcome, StorageResult},
};

#[derive(Clone)]
pub struct MongoActivityStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = self.config.open().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoActivityStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.open().await?;
        info!(database = %config.database_name(), "connected to MongoDB");

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let activities = self.activities().await;
        for (keys, name, field) in [
            (doc! {"course_id": 1}, "activity_course_idx", "course_id"),
            (doc! {"state": 1}, "activity_state_idx", "state"),
        ] {
            let index = mongodb::IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            activities
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: ACTIVITY_COLLECTION,
                    index: field,
                    source,
                })?;
        }

        let join_index = mongodb::IndexModel::builder()
            .keys(doc! {"join_token": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("activity_join_token_idx".to_owned()))
                    .unique(Some(true))
                    .sparse(Some(true))
                    .build(),
            )
            .build();
        activities
            .create_index(join_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ACTIVITY_COLLECTION,
                index: "join_token",
                source,
            })?;

        // One row per (activity, student): the at-most-once submission contract.
        let response_index = mongodb::IndexModel::builder()
            .keys(doc! {"activity_id": 1, "student_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("response_student_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        self.responses()
            .await
            .create_index(response_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESPONSE_COLLECTION,
                index: "activity_id,student_id",
                source,
            })?;

        Ok(())
    }

    async fn activities(&self) -> Collection<MongoActivityDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoActivityDocument>(ACTIVITY_COLLECTION)
    }

    async fn responses(&self) -> Collection<MongoResponseDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoResponseDocument>(RESPONSE_COLLECTION)
    }

    async fn save_activity(&self, activity: ActivityEntity) -> MongoResult<()> {
        let id = activity.id;
        let document: MongoActivityDocument = activity.into();
        self.activities()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveActivity { id, source })?;
        Ok(())
    }

    async fn find_activity(&self, id: Uuid) -> MongoResult<Option<ActivityEntity>> {
        let document = self
            .activities()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadActivity { id, source })?;

        document.map(ActivityEntity::try_from).transpose()
    }

    async fn find_by_join_token(&self, token: String) -> MongoResult<Option<ActivityEntity>> {
        let document = self
            .activities()
            .await
            .find_one(doc! {"join_token": token})
            .await
            .map_err(|source| MongoDaoError::ListActivities { source })?;

        document.map(ActivityEntity::try_from).transpose()
    }

    async fn list_where(&self, filter: mongodb::bson::Document) -> MongoResult<Vec<ActivityEntity>> {
        let documents: Vec<MongoActivityDocument> = self
            .activities()
            .await
            .find(filter)
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListActivities { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListActivities { source })?;

        documents.into_iter().map(ActivityEntity::try_from).collect()
    }

    /// Drop every response of an activity. Safe to repeat.
    async fn purge_responses(&self, activity_id: Uuid) -> MongoResult<()> {
        self.responses()
            .await
            .delete_many(doc! {"activity_id": activity_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::PurgeResponses {
                activity_id,
                source,
            })?;
        Ok(())
    }

    /// Responses go first so an interrupted delete leaves no orphans and a
    /// retry converges.
    async fn delete_activity(&self, id: Uuid) -> MongoResult<bool> {
        self.purge_responses(id).await?;

        let result = self
            .activities()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteActivity { id, source })?;

        Ok(result.deleted_count > 0)
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected: &LifecycleEntity,
        next: &LifecycleEntity,
    ) -> MongoResult<CasOutcome> {
        let result = self
            .activities()
            .await
            .update_one(lifecycle_guard(id, expected), lifecycle_update(next))
            .await
            .map_err(|source| MongoDaoError::UpdateLifecycle { id, source })?;

        if result.matched_count > 0 {
            return Ok(CasOutcome::Applied);
        }

        // Nothing matched: tell a concurrent writer apart from a missing row.
        let exists = self
            .activities()
            .await
            .count_documents(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadActivity { id, source })?;

        Ok(if exists > 0 {
            CasOutcome::Conflict
        } else {
            CasOutcome::Missing
        })
    }

    async fn reset_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> MongoResult<CasOutcome> {
        // Purge before the lifecycle write: if the write is lost the activity
        // keeps its old state and a repeated reset converges.
        let guarded = self
            .activities()
            .await
            .count_documents(lifecycle_guard(id, &expected))
            .await
            .map_err(|source| MongoDaoError::LoadActivity { id, source })?;
        if guarded > 0 {
            self.purge_responses(id).await?;
        }
        self.compare_and_set(id, &expected, &next).await
    }

    async fn record_response(
        &self,
        response: ResponseEntity,
        start_epoch: u64,
    ) -> MongoResult<RecordOutcome> {
        let activity_id = response.activity_id;
        let Some(activity) = self.find_activity(activity_id).await? else {
            return Ok(RecordOutcome::ActivityMissing);
        };
        if activity.lifecycle.state != LifecycleStateEntity::Running
            || activity.lifecycle.start_epoch != start_epoch
        {
            return Ok(RecordOutcome::NotRunning);
        }

        let key = response_key(activity_id, response.student_id);
        // The filter supplies activity_id and student_id on insert.
        let update = doc! {
            "$set": {
                "answer": response.answer.as_str(),
                "is_correct": response.is_correct,
                "score": response.score.map(i32::from),
                "points_earned": response.points_earned.map(i32::from),
                "submitted_at": DateTime::from_system_time(response.submitted_at),
            },
            "$setOnInsert": { "_id": response.id.to_string() },
        };

        let responses = self.responses().await;
        let result = responses
            .update_one(key, update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveResponse {
                activity_id,
                source,
            })?;

        let response_count = self.count_responses(activity_id).await?;
        Ok(if result.upserted_id.is_some() {
            RecordOutcome::Inserted { response_count }
        } else {
            RecordOutcome::Replaced { response_count }
        })
    }

    async fn find_response(
        &self,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> MongoResult<Option<ResponseEntity>> {
        let document = self
            .responses()
            .await
            .find_one(response_key(activity_id, student_id))
            .await
            .map_err(|source| MongoDaoError::LoadResponses {
                activity_id,
                source,
            })?;

        document.map(ResponseEntity::try_from).transpose()
    }

    async fn list_responses(&self, activity_id: Uuid) -> MongoResult<Vec<ResponseEntity>> {
        let documents: Vec<MongoResponseDocument> = self
            .responses()
            .await
            .find(doc! {"activity_id": activity_id.to_string()})
            .sort(doc! {"submitted_at": 1})
            .await
            .map_err(|source| MongoDaoError::LoadResponses {
                activity_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadResponses {
                activity_id,
                source,
            })?;

        documents.into_iter().map(ResponseEntity::try_from).collect()
    }

    async fn count_responses(&self, activity_id: Uuid) -> MongoResult<u64> {
        self.responses()
            .await
            .count_documents(doc! {"activity_id": activity_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::LoadResponses {
                activity_id,
                source,
            })
    }
}

impl ActivityStore for MongoActivityStore {
    fn save_activity(&self, activity: ActivityEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_activity(activity).await.map_err(Into::into) })
    }

    fn find_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_activity(id).await.map_err(Into::into) })
    }

    fn find_by_join_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_by_join_token(token).await.map_err(Into::into) })
    }

    fn list_activities(
        &self,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_where(doc! {"course_id": course_id.to_string()})
                .await
                .map_err(Into::into)
        })
    }

    fn list_running(&self) -> BoxFuture<'static, StorageResult<Vec<ActivityEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_where(doc! {"state": LifecycleStateEntity::Running.as_str()})
                .await
                .map_err(Into::into)
        })
    }

    fn delete_activity(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_activity(id).await.map_err(Into::into) })
    }

    fn compare_and_set_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_set(id, &expected, &next)
                .await
                .map_err(Into::into)
        })
    }

    fn reset_lifecycle(
        &self,
        id: Uuid,
        expected: LifecycleEntity,
        next: LifecycleEntity,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .reset_lifecycle(id, expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn record_response(
        &self,
        response: ResponseEntity,
        start_epoch: u64,
    ) -> BoxFuture<'static, StorageResult<RecordOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_response(response, start_epoch)
                .await
                .map_err(Into::into)
        })
    }

    fn find_response(
        &self,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_response(activity_id, student_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_responses(
        &self,
        activity_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_responses(activity_id).await.map_err(Into::into) })
    }

    fn count_responses(&self, activity_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_responses(activity_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::ActivityKind;

    // Needs a reachable MongoDB: `MONGO_URI=... cargo test --features mongo-store -- --ignored`
    async fn store() -> MongoActivityStore {
        let uri =
            std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
        let config = MongoConfig::from_uri(&uri, Some("classpulse_store_tests"))
            .await
            .unwrap();
        MongoActivityStore::connect(config).await.unwrap()
    }

    fn running_poll() -> ActivityEntity {
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
            lifecycle: LifecycleEntity {
                state: LifecycleStateEntity::Running,
                started_at: Some(SystemTime::now()),
                ended_at: None,
                start_epoch: 1,
            },
            join_token: None,
            created_at: SystemTime::now(),
        }
    }

    fn response(activity_id: Uuid) -> ResponseEntity {
        ResponseEntity {
            id: Uuid::new_v4(),
            activity_id,
            student_id: Uuid::new_v4(),
            answer: "A".into(),
            is_correct: None,
            score: None,
            points_earned: None,
            submitted_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn reset_purges_only_when_guard_matches_and_repeats_cleanly() {
        let store = store().await;
        let activity = running_poll();
        let id = activity.id;
        store.save_activity(activity).await.unwrap();
        for _ in 0..2 {
            store.record_response(response(id), 1).await.unwrap();
        }
        let stored = store.find_activity(id).await.unwrap().unwrap().lifecycle;

        let stale = LifecycleEntity {
            start_epoch: 7,
            ..stored.clone()
        };
        let outcome = store
            .reset_lifecycle(id, stale, LifecycleEntity::draft())
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
        assert_eq!(store.count_responses(id).await.unwrap(), 2);

        let draft = LifecycleEntity {
            start_epoch: stored.start_epoch,
            ..LifecycleEntity::draft()
        };
        let outcome = store
            .reset_lifecycle(id, stored.clone(), draft.clone())
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Applied);
        assert_eq!(store.count_responses(id).await.unwrap(), 0);

        let again = store.reset_lifecycle(id, stored, draft).await.unwrap();
        assert_eq!(again, CasOutcome::Conflict);

        store.delete_activity(id).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn delete_leaves_no_responses_behind() {
        let store = store().await;
        let activity = running_poll();
        let id = activity.id;
        store.save_activity(activity).await.unwrap();
        store.record_response(response(id), 1).await.unwrap();

        assert!(store.delete_activity(id).await.unwrap());
        assert_eq!(store.count_responses(id).await.unwrap(), 0);
        assert!(!store.delete_activity(id).await.unwrap());
    }
}
