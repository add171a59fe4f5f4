//! Publish/subscribe bus shared by every execution context.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Mutations
//! publish a [`BusEvent`] through the bus, and subscription resolvers turn
//! the receiver into a filtered stream for their connection.

use futures_util::Stream;
use futures_util::stream;
use tokio::sync::broadcast;

use super::{BusEvent, Topic};

/// Broadcast bus for [`BusEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: BusEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Returns a stream of future events published under `topic`.
    ///
    /// Lagged receivers skip the dropped events and keep going; the stream
    /// ends when the bus is dropped.
    pub fn topic_stream(&self, topic: Topic) -> impl Stream<Item = BusEvent> + Send + 'static {
        stream::unfold(self.subscribe(), move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.topic() == topic => return Some((event, rx)),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, ?topic, "subscriber lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns `true` if both handles publish into the same channel.
    #[must_use]
    pub fn same_bus(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }
}
