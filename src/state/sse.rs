use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// One SSE hub per game, created on first subscription.
pub struct GameChannels {
    hubs: DashMap<Uuid, SseHub>,
    capacity: usize,
}

impl GameChannels {
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the events of a game.
    pub fn subscribe(&self, game_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(game_id)
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Publish to the subscribers of a game; nothing happens when nobody listens.
    pub fn publish(&self, game_id: Uuid, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(&game_id) {
            hub.broadcast(event);
        }
    }

    /// Drop the hub of a game, ending every open stream.
    pub fn close(&self, game_id: Uuid) {
        self.hubs.remove(&game_id);
    }

    /// Drop the hub of a game when nobody listens to it anymore.
    pub fn release_if_idle(&self, game_id: Uuid) {
        self.hubs
            .remove_if(&game_id, |_, hub| hub.receiver_count() == 0);
    }

    /// Number of games with a hub.
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// True when no game has a hub.
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closing_a_game_ends_its_streams() {
        let channels = GameChannels::new(4);
        let game_id = Uuid::new_v4();
        let mut receiver = channels.subscribe(game_id);

        channels.publish(game_id, ServerEvent::new(Some("ping".into()), "{}".into()));
        assert_eq!(receiver.recv().await.unwrap().event.as_deref(), Some("ping"));

        channels.close(game_id);
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(channels.len(), 0);
    }

    #[test]
    fn idle_hubs_are_released() {
        let channels = GameChannels::new(4);
        let game_id = Uuid::new_v4();
        let receiver = channels.subscribe(game_id);

        channels.release_if_idle(game_id);
        assert_eq!(channels.len(), 1);

        drop(receiver);
        channels.release_if_idle(game_id);
        assert_eq!(channels.len(), 0);
    }

    #[test]
    fn publishing_without_subscribers_creates_nothing() {
        let channels = GameChannels::new(4);
        channels.publish(Uuid::new_v4(), ServerEvent::new(None, "{}".into()));
        assert_eq!(channels.len(), 0);
    }
}
