use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use super::ServerEvent;

const CAPACITY: usize = 64;

pub type Frame = Arc<str>;

#[derive(Default)]
struct Streams {
    rooms: HashMap<String, broadcast::Sender<Frame>>,
    users: HashMap<Uuid, broadcast::Sender<Frame>>,
}

/// Fan-out of serialized events to sockets, per channel and per user.
///
/// Delivery is fire-and-forget: nobody listening means the frame is dropped,
/// and a socket that falls `CAPACITY` frames behind skips ahead.
#[derive(Clone, Default)]
pub struct Hub {
    streams: Arc<Mutex<Streams>>,
}

impl Hub {
    fn with_streams<T>(&self, f: impl FnOnce(&mut Streams) -> T) -> T {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut streams)
    }

    pub fn subscribe_room(&self, room: &str) -> broadcast::Receiver<Frame> {
        self.with_streams(|streams| {
            streams
                .rooms
                .entry(room.to_owned())
                .or_insert_with(|| broadcast::channel(CAPACITY).0)
                .subscribe()
        })
    }

    pub fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<Frame> {
        self.with_streams(|streams| {
            streams
                .users
                .entry(user_id)
                .or_insert_with(|| broadcast::channel(CAPACITY).0)
                .subscribe()
        })
    }

    /// Drops streams whose last receiver is gone.
    pub fn prune(&self) {
        self.with_streams(|streams| {
            streams.rooms.retain(|_, sender| sender.receiver_count() > 0);
            streams.users.retain(|_, sender| sender.receiver_count() > 0);
        })
    }

    /// Returns how many sockets the event reached.
    pub fn to_room(&self, room: &str, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else { return 0 };
        self.with_streams(|streams| publish(&mut streams.rooms, room.to_owned(), frame))
    }

    pub fn to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else { return 0 };
        self.with_streams(|streams| publish(&mut streams.users, user_id, frame))
    }
}

pub(super) fn encode(event: &ServerEvent) -> Option<Frame> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(err) => {
            warn!(%err, "unable to encode socket event");
            None
        }
    }
}

fn publish<K: std::hash::Hash + Eq>(
    senders: &mut HashMap<K, broadcast::Sender<Frame>>,
    key: K,
    frame: Frame,
) -> usize {
    let Some(sender) = senders.get(&key) else { return 0 };
    match sender.send(frame) {
        Ok(reached) => reached,
        Err(_) => {
            // every receiver is gone
            senders.remove(&key);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> ServerEvent {
        ServerEvent::Error { message: message.into() }
    }

    #[tokio::test]
    async fn room_frames_reach_every_subscriber() {
        let hub = Hub::default();
        let mut first = hub.subscribe_room("general");
        let mut second = hub.subscribe_room("general");
        let mut elsewhere = hub.subscribe_room("random");

        assert_eq!(hub.to_room("general", &error("hello")), 2);

        for rx in [&mut first, &mut second] {
            let frame = rx.recv().await.unwrap();
            assert!(frame.contains("hello"));
        }
        assert!(elsewhere.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_frames_are_private() {
        let hub = Hub::default();
        let (ada, bob) = (Uuid::now_v7(), Uuid::now_v7());
        let mut ada_rx = hub.subscribe_user(ada);
        let mut bob_rx = hub.subscribe_user(bob);

        assert_eq!(hub.to_user(ada, &error("psst")), 1);
        assert!(ada_rx.recv().await.unwrap().contains("psst"));
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn nobody_listening_drops_the_frame() {
        let hub = Hub::default();
        assert_eq!(hub.to_room("empty", &error("anyone?")), 0);

        drop(hub.subscribe_room("gone"));
        assert_eq!(hub.to_room("gone", &error("anyone?")), 0);
        assert!(hub.with_streams(|streams| !streams.rooms.contains_key("gone")));
    }

    #[tokio::test]
    async fn prune_forgets_abandoned_streams() {
        let hub = Hub::default();
        let (ada, bob) = (Uuid::now_v7(), Uuid::now_v7());
        drop(hub.subscribe_user(ada));
        drop(hub.subscribe_room("robotics"));
        let _bob_rx = hub.subscribe_user(bob);

        hub.prune();
        hub.with_streams(|streams| {
            assert!(!streams.users.contains_key(&ada));
            assert!(streams.users.contains_key(&bob));
            assert!(streams.rooms.is_empty());
        });
        assert_eq!(hub.to_user(bob, &error("still here")), 1);
    }
}
