use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::ActivityEntity,
    dto::{
        format_system_time,
        ws::{ActivityUpdateData, ServerMessage, UpdateType},
    },
    state::{SharedState, lifecycle::Lifecycle},
};

pub const AUTO_ENDED_MESSAGE: &str = "Activity has ended automatically";
pub const RESET_MESSAGE: &str = "Activity has been reset";
pub const RESPONSE_ADDED_MESSAGE: &str = "New response received";

/// Publish on the activity's room; delivery failures are logged and dropped.
fn publish(state: &SharedState, activity_id: Uuid, message: ServerMessage) {
    let update = message.event_name();
    let delivered = state.rooms().publish(activity_id, message);
    debug!(activity_id = %activity_id, update, delivered, "room event published");
}

fn update(
    state: &SharedState,
    activity_id: Uuid,
    update_type: UpdateType,
    data: ActivityUpdateData,
) {
    publish(
        state,
        activity_id,
        ServerMessage::ActivityUpdate {
            activity_id,
            update_type,
            data,
        },
    );
}

pub fn broadcast_started(state: &SharedState, activity: &ActivityEntity, lifecycle: &Lifecycle) {
    let offset = state.config().wire_offset();
    let duration = Duration::from_secs(u64::from(activity.duration_seconds));
    update(
        state,
        activity.id,
        UpdateType::Started,
        ActivityUpdateData {
            is_active: true,
            started_at: lifecycle.started_at().map(|t| format_system_time(t, offset)),
            duration_seconds: Some(activity.duration_seconds),
            will_end_at: lifecycle
                .will_end_at(duration)
                .map(|t| format_system_time(t, offset)),
            ..Default::default()
        },
    );
}

pub fn broadcast_ended(state: &SharedState, activity_id: Uuid, lifecycle: &Lifecycle) {
    let offset = state.config().wire_offset();
    update(
        state,
        activity_id,
        UpdateType::Ended,
        ActivityUpdateData {
            is_active: false,
            ended_at: lifecycle.ended_at().map(|t| format_system_time(t, offset)),
            ..Default::default()
        },
    );
}

pub fn broadcast_auto_ended(state: &SharedState, activity_id: Uuid, lifecycle: &Lifecycle) {
    let offset = state.config().wire_offset();
    update(
        state,
        activity_id,
        UpdateType::AutoEnded,
        ActivityUpdateData {
            is_active: false,
            ended_at: lifecycle.ended_at().map(|t| format_system_time(t, offset)),
            message: Some(AUTO_ENDED_MESSAGE.into()),
            ..Default::default()
        },
    );
}

pub fn broadcast_reset(state: &SharedState, activity_id: Uuid) {
    update(
        state,
        activity_id,
        UpdateType::Reset,
        ActivityUpdateData {
            is_active: false,
            message: Some(RESET_MESSAGE.into()),
            ..Default::default()
        },
    );
}

pub fn broadcast_response_added(state: &SharedState, activity_id: Uuid, response_count: u64) {
    publish(
        state,
        activity_id,
        ServerMessage::ResponseAdded {
            activity_id,
            response_count,
            message: RESPONSE_ADDED_MESSAGE.into(),
        },
    );
}
