use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        activity_store::ActivityStore,
        directory::{Role, UserEntity},
        models::{ActivityEntity, LifecycleEntity, ResponseEntity},
        storage::{CasOutcome, RecordOutcome, StorageError},
    },
    dto::{
        format_system_time,
        lifecycle::{
            ActionResponse, ActivityStatus, StaffStatus, StartResponse, StudentStatus,
            SubmitRequest,
        },
    },
    error::ServiceError,
    services::{
        access::{ensure_controller, ensure_enrolled, load_activity},
        expiry_service, room_events, scoring,
    },
    state::{
        SharedState,
        lifecycle::{Lifecycle, LifecycleEvent, NoTransition},
    },
};

/// Optimistic lifecycle writes retried this many times before giving up.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Result of applying a lifecycle event against the store.
enum Applied {
    Changed {
        activity: ActivityEntity,
        lifecycle: Lifecycle,
    },
    Skipped(NoTransition),
}

fn decode(activity: &ActivityEntity) -> Result<Lifecycle, ServiceError> {
    Lifecycle::try_from(&activity.lifecycle)
        .map_err(|err| ServiceError::Unavailable(StorageError::Corrupt(err.to_string())))
}

/// Plan `event` against the stored lifecycle and write it with compare-and-set,
/// reloading and replanning when another writer got there first.
async fn apply_event<E>(
    store: &Arc<dyn ActivityStore>,
    mut activity: ActivityEntity,
    event: E,
    purge_responses: bool,
) -> Result<Applied, ServiceError>
where
    E: Fn(SystemTime) -> LifecycleEvent,
{
    let activity_id = activity.id;
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let current = decode(&activity)?;
        let next = match current.plan(event(SystemTime::now())) {
            Ok(next) => next,
            Err(reason) => return Ok(Applied::Skipped(reason)),
        };

        let expected = activity.lifecycle.clone();
        let next_entity = LifecycleEntity::from(next);
        let outcome = if purge_responses {
            store
                .reset_lifecycle(activity_id, expected, next_entity.clone())
                .await?
        } else {
            store
                .compare_and_set_lifecycle(activity_id, expected, next_entity.clone())
                .await?
        };

        match outcome {
            CasOutcome::Applied => {
                activity.lifecycle = next_entity;
                return Ok(Applied::Changed {
                    activity,
                    lifecycle: next,
                });
            }
            CasOutcome::Conflict => {
                debug!(activity_id = %activity_id, attempt, "lifecycle changed underneath; reloading");
                activity = load_activity(store, activity_id).await?;
            }
            CasOutcome::Missing => {
                return Err(ServiceError::NotFound("Activity not found".into()));
            }
        }
    }

    Err(ServiceError::InvalidState(
        "activity was modified concurrently; try again".into(),
    ))
}

/// Start (or restart) an activity and arm its expiry timer.
pub async fn start(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<StartResponse, ServiceError> {
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let activity = load_activity(&store, activity_id).await?;
            ensure_controller(user, &activity)?;

            let Applied::Changed {
                activity,
                lifecycle,
            } = apply_event(&store, activity, |now| LifecycleEvent::Start { now }, false).await?
            else {
                return Err(ServiceError::InvalidState("activity cannot be started".into()));
            };

            expiry_service::schedule(state, &activity, &lifecycle);
            room_events::broadcast_started(state, &activity, &lifecycle);

            let duration = Duration::from_secs(u64::from(activity.duration_seconds));
            let will_end_at = lifecycle
                .will_end_at(duration)
                .map(|t| format_system_time(t, state.config().wire_offset()))
                .unwrap_or_default();
            info!(
                activity_id = %activity_id,
                epoch = lifecycle.epoch(),
                duration_seconds = activity.duration_seconds,
                "activity started"
            );

            Ok(StartResponse {
                success: true,
                message: "Activity started".into(),
                duration_minutes: f64::from(activity.duration_seconds) / 60.0,
                will_end_at,
            })
        })
        .await
}

/// Close a running activity. Stopping a draft or ended activity changes nothing.
pub async fn stop(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let activity = load_activity(&store, activity_id).await?;
            ensure_controller(user, &activity)?;

            match apply_event(&store, activity, |now| LifecycleEvent::Stop { now }, false).await? {
                Applied::Changed { lifecycle, .. } => {
                    state.expiries().disarm(activity_id, lifecycle.epoch());
                    room_events::broadcast_ended(state, activity_id, &lifecycle);
                    info!(activity_id = %activity_id, epoch = lifecycle.epoch(), "activity stopped");
                    Ok(ActionResponse::ok("Activity stopped"))
                }
                Applied::Skipped(reason) => {
                    debug!(activity_id = %activity_id, %reason, "stop ignored");
                    Ok(ActionResponse::ok("Activity is not running"))
                }
            }
        })
        .await
}

/// Return an activity to draft and delete every response it collected.
pub async fn reset(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let activity = load_activity(&store, activity_id).await?;
            ensure_controller(user, &activity)?;
            let previous_epoch = activity.lifecycle.start_epoch;

            let Applied::Changed { .. } =
                apply_event(&store, activity, |_| LifecycleEvent::Reset, true).await?
            else {
                return Err(ServiceError::InvalidState("activity cannot be reset".into()));
            };

            state.expiries().disarm(activity_id, previous_epoch);
            room_events::broadcast_reset(state, activity_id);
            info!(activity_id = %activity_id, "activity reset; responses purged");
            Ok(ActionResponse::ok("Activity reset"))
        })
        .await
}

/// Close the run identified by `epoch` when its timer fires.
///
/// Returns `false` when the activity was stopped, reset, restarted or deleted
/// since the timer was armed.
pub async fn expire(state: &SharedState, activity_id: Uuid, epoch: u64) -> Result<bool, ServiceError> {
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let Some(activity) = store.find_activity(activity_id).await? else {
                debug!(activity_id = %activity_id, epoch, "expiry fired for deleted activity");
                return Ok(false);
            };

            match apply_event(
                &store,
                activity,
                |now| LifecycleEvent::Expire { epoch, now },
                false,
            )
            .await?
            {
                Applied::Changed { lifecycle, .. } => {
                    room_events::broadcast_auto_ended(state, activity_id, &lifecycle);
                    info!(activity_id = %activity_id, epoch, "activity ended automatically");
                    Ok(true)
                }
                Applied::Skipped(reason) => {
                    debug!(activity_id = %activity_id, epoch, %reason, "stale expiry ignored");
                    Ok(false)
                }
            }
        })
        .await
}

/// Record a student's answer, replacing any earlier answer of the same student.
pub async fn submit(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
    request: SubmitRequest,
) -> Result<ActionResponse, ServiceError> {
    if user.role != Role::Student {
        return Err(ServiceError::Forbidden);
    }
    let store = state.require_activity_store().await?;
    state
        .run_gated(activity_id, move || async move {
            let activity = load_activity(&store, activity_id).await?;
            ensure_enrolled(state, user.id, activity.course_id).await?;

            let lifecycle = decode(&activity)?;
            if !lifecycle.is_running() {
                return Err(ServiceError::NotRunning);
            }

            let answer = request.answer.trim();
            if answer.is_empty() {
                return Err(ServiceError::EmptyAnswer);
            }

            let grade = scoring::grade(&activity, answer, request.correct_sequence.as_deref());
            let response = ResponseEntity {
                id: Uuid::new_v4(),
                activity_id,
                student_id: user.id,
                answer: answer.to_string(),
                is_correct: grade.map(|g| g.is_correct),
                score: grade.map(|g| g.score),
                points_earned: grade.map(|g| g.score),
                submitted_at: SystemTime::now(),
            };

            match store.record_response(response, lifecycle.epoch()).await? {
                RecordOutcome::Inserted { response_count } => {
                    room_events::broadcast_response_added(state, activity_id, response_count);
                    debug!(activity_id = %activity_id, student_id = %user.id, response_count, "response recorded");
                    Ok(ActionResponse::ok("Response submitted successfully"))
                }
                RecordOutcome::Replaced { .. } => {
                    debug!(activity_id = %activity_id, student_id = %user.id, "response replaced");
                    Ok(ActionResponse::ok("Response updated successfully"))
                }
                RecordOutcome::NotRunning => Err(ServiceError::NotRunning),
                RecordOutcome::ActivityMissing => {
                    Err(ServiceError::NotFound("Activity not found".into()))
                }
            }
        })
        .await
}

/// Lifecycle status; students only see their own answer.
pub async fn status(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<ActivityStatus, ServiceError> {
    let store = state.require_activity_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    let lifecycle = decode(&activity)?;
    let is_active = lifecycle.is_running();

    if user.role == Role::Student {
        let mine = store.find_response(activity_id, user.id).await?;
        return Ok(ActivityStatus::Student(StudentStatus {
            is_active,
            has_responded: mine.is_some(),
            my_answer: mine.map(|response| response.answer),
        }));
    }

    let offset = state.config().wire_offset();
    Ok(ActivityStatus::Staff(StaffStatus {
        is_active,
        response_count: store.count_responses(activity_id).await?,
        started_at: lifecycle.started_at().map(|t| format_system_time(t, offset)),
        ended_at: lifecycle.ended_at().map(|t| format_system_time(t, offset)),
    }))
}
