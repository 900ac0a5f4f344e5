use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::directory::UserEntity,
    dto::ws::{ClientMessage, ServerMessage},
    error::{AppError, ServiceError},
    services::access::load_activity,
    state::{SharedState, rooms::topic},
};

/// Handle the full lifecycle of one authenticated WebSocket connection.
///
/// A connection may join any number of activity rooms; each joined room gets a
/// forwarder task relaying room events onto the socket's writer channel.
pub async fn handle_socket(state: SharedState, user: UserEntity, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(user_id = %user.id, "websocket connected");
    let mut joined: HashMap<Uuid, oneshot::Sender<()>> = HashMap::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::JoinActivity { activity_id }) => {
                    let joined_room =
                        join(&state, &user, activity_id, &outbound_tx, &mut joined).await;
                    let reply = match joined_room {
                        Ok(()) => ServerMessage::Joined {
                            activity_id,
                            room: topic(activity_id),
                        },
                        Err(err) => ServerMessage::Error {
                            message: AppError::from(err).message().to_string(),
                        },
                    };
                    if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::LeaveActivity { activity_id }) => {
                    leave(activity_id, &mut joined);
                    if send_message_to_websocket(&outbound_tx, &ServerMessage::Left { activity_id })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    warn!(user_id = %user.id, error = %err, "failed to parse websocket message");
                    let reply = ServerMessage::Error {
                        message: "Unsupported message".into(),
                    };
                    if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "websocket error");
                break;
            }
        }
    }

    // Dropping the stop handles ends every forwarder.
    joined.clear();
    info!(user_id = %user.id, "websocket disconnected");

    drop(outbound_tx);
    let _ = writer_task.await;
}

/// Subscribe the connection to the room of an existing activity.
async fn join(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    joined: &mut HashMap<Uuid, oneshot::Sender<()>>,
) -> Result<(), ServiceError> {
    if joined.contains_key(&activity_id) {
        return Ok(());
    }

    let store = state.require_activity_store().await?;
    load_activity(&store, activity_id).await?;

    let mut room = state.rooms().subscribe(activity_id);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let tx = outbound_tx.clone();
    let state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                // Resolves on explicit leave or when the connection drops the sender.
                _ = &mut stop_rx => break,
                received = room.recv() => match received {
                    Ok(message) => {
                        if send_message_to_websocket(&tx, &message).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(activity_id = %activity_id, skipped, "websocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        drop(room);
        state.rooms().prune(activity_id);
    });

    joined.insert(activity_id, stop_tx);
    debug!(user_id = %user.id, activity_id = %activity_id, "joined activity room");
    Ok(())
}

fn leave(activity_id: Uuid, joined: &mut HashMap<Uuid, oneshot::Sender<()>>) {
    if let Some(stop) = joined.remove(&activity_id) {
        let _ = stop.send(());
    }
}

/// Writer channel of the connection is closed.
#[derive(Debug)]
struct ConnectionClosed;

/// Serialize a payload and push it onto the writer channel.
///
/// Fails only when the writer has gone away; serialization errors are logged
/// and swallowed.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}
