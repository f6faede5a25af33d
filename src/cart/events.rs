//! Cart lifecycle events for observers (achievement hooks, announcers, tests).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::cart::types::{ChannelId, GuildId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// Emitted once per successful open, before the stock is rolled.
    Arrived { guild: GuildId, channel: ChannelId },
    Departed { guild: GuildId },
    Purchased {
        guild: GuildId,
        user: UserId,
        item: String,
        quantity: u64,
        total: u64,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: CartEvent);
}

/// Broadcast fan-out of [`CartEvent`]s. Publishing with nobody listening is fine.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CartEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: CartEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("cart event dropped: no subscribers");
        }
    }
}
