use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Topic name of an activity room.
pub fn topic(activity_id: Uuid) -> String {
    format!("activity_{activity_id}")
}

/// Room-per-activity broadcast hub.
///
/// Each room is a Tokio broadcast channel created on first subscription; every
/// subscriber keeps its own cursor, and slow subscribers lag instead of blocking
/// publishers.
pub struct ActivityRooms {
    capacity: usize,
    rooms: DashMap<Uuid, broadcast::Sender<ServerMessage>>,
}

impl ActivityRooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: DashMap::new(),
        }
    }

    /// Join the room of `activity_id`, creating it when needed.
    pub fn subscribe(&self, activity_id: Uuid) -> broadcast::Receiver<ServerMessage> {
        self.rooms
            .entry(activity_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver `message` to the room's current subscribers.
    ///
    /// Returns how many subscribers received it. Delivery is best effort: a
    /// room nobody listens to simply drops the message.
    pub fn publish(&self, activity_id: Uuid, message: ServerMessage) -> usize {
        let Some(sender) = self.rooms.get(&activity_id).map(|room| room.clone()) else {
            debug!(activity_id = %activity_id, "no room for activity; event dropped");
            return 0;
        };

        match sender.send(message) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!(activity_id = %activity_id, "room has no subscribers; event dropped");
                0
            }
        }
    }

    /// Drop the room once its last subscriber has gone.
    pub fn prune(&self, activity_id: Uuid) {
        self.rooms
            .remove_if(&activity_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, activity_id: Uuid) -> usize {
        self.rooms
            .get(&activity_id)
            .map(|room| room.receiver_count())
            .unwrap_or(0)
    }

    /// Rooms with at least one subscriber.
    pub fn open_rooms(&self) -> usize {
        self.rooms
            .iter()
            .filter(|room| room.receiver_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> ServerMessage {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn rooms_are_isolated_per_activity() {
        let rooms = ActivityRooms::new(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = rooms.subscribe(a);
        let mut rx_b = rooms.subscribe(b);

        assert_eq!(rooms.publish(a, error("for a")), 1);
        assert_eq!(rx_a.recv().await.unwrap(), error("for a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribers_observe_publish_order() {
        let rooms = ActivityRooms::new(8);
        let id = Uuid::new_v4();
        let mut first = rooms.subscribe(id);
        let mut second = rooms.subscribe(id);

        rooms.publish(id, error("one"));
        rooms.publish(id, error("two"));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap(), error("one"));
            assert_eq!(rx.recv().await.unwrap(), error("two"));
        }
    }

    #[test]
    fn publish_without_listeners_is_dropped() {
        let rooms = ActivityRooms::new(8);
        let id = Uuid::new_v4();
        assert_eq!(rooms.publish(id, error("lost")), 0);

        let rx = rooms.subscribe(id);
        drop(rx);
        assert_eq!(rooms.publish(id, error("lost")), 0);
    }

    #[test]
    fn prune_keeps_rooms_with_listeners() {
        let rooms = ActivityRooms::new(8);
        let id = Uuid::new_v4();
        let rx = rooms.subscribe(id);
        rooms.prune(id);
        assert_eq!(rooms.subscriber_count(id), 1);
        assert_eq!(rooms.open_rooms(), 1);

        drop(rx);
        rooms.prune(id);
        assert_eq!(rooms.open_rooms(), 0);
        assert_eq!(topic(id), format!("activity_{id}"));
    }
}
