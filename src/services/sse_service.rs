use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::ServiceError,
    services::access::load_activity,
    state::SharedState,
};

/// Subscribe any authenticated user to the event room of one activity.
pub async fn subscribe_activity(
    state: &SharedState,
    activity_id: Uuid,
) -> Result<broadcast::Receiver<ServerMessage>, ServiceError> {
    let store = state.require_activity_store().await?;
    load_activity(&store, activity_id).await?;
    Ok(state.rooms().subscribe(activity_id))
}

/// Convert a room receiver into an SSE response, forwarding events and
/// pruning the room once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    activity_id: Uuid,
    mut receiver: broadcast::Receiver<ServerMessage>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(message) => {
                            let event = match Event::default()
                                .event(message.event_name())
                                .json_data(&message)
                            {
                                Ok(event) => event,
                                Err(err) => {
                                    warn!(activity_id = %activity_id, error = %err, "failed to encode SSE event");
                                    continue;
                                }
                            };

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(activity_id = %activity_id, skipped, "SSE subscriber lagged");
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.rooms().prune(activity_id);
        info!(activity_id = %activity_id, "activity SSE stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
