use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinActivity { activity_id: Uuid },
    LeaveActivity { activity_id: Uuid },
}

/// Kind of lifecycle change carried by an `activity_update` message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Started,
    Ended,
    AutoEnded,
    Reset,
}

impl UpdateType {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Started => "started",
            UpdateType::Ended => "ended",
            UpdateType::AutoEnded => "auto_ended",
            UpdateType::Reset => "reset",
        }
    }
}

/// Payload of a lifecycle update; fields present depend on the update type.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ActivityUpdateData {
    pub is_active: bool,
    pub started_at: Option<String>,
    pub duration_seconds: Option<u32>,
    pub will_end_at: Option<String>,
    pub ended_at: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
/// Messages pushed to clients subscribed to an activity room.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ActivityUpdate {
        activity_id: Uuid,
        update_type: UpdateType,
        data: ActivityUpdateData,
    },
    ResponseAdded {
        activity_id: Uuid,
        response_count: u64,
        message: String,
    },
    /// Acknowledges a `join_activity` request.
    Joined { activity_id: Uuid, room: String },
    /// Acknowledges a `leave_activity` request.
    Left { activity_id: Uuid },
    Error { message: String },
}

impl ServerMessage {
    /// Event name used when the message travels over SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::ActivityUpdate { .. } => "activity_update",
            ServerMessage::ResponseAdded { .. } => "response_added",
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::Left { .. } => "left",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_room_commands() {
        let id = Uuid::new_v4();
        let parsed: ClientMessage =
            serde_json::from_value(json!({"type": "join_activity", "activity_id": id})).unwrap();
        assert!(matches!(parsed, ClientMessage::JoinActivity { activity_id } if activity_id == id));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn update_payload_omits_absent_fields() {
        let id = Uuid::nil();
        let message = ServerMessage::ActivityUpdate {
            activity_id: id,
            update_type: UpdateType::Reset,
            data: ActivityUpdateData {
                is_active: false,
                message: Some("Activity has been reset".into()),
                ..Default::default()
            },
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "activity_update",
                "activity_id": id,
                "update_type": "reset",
                "data": {"is_active": false, "message": "Activity has been reset"}
            })
        );
    }
}
