//! Fan-out of entity and execution events to live observers.
//!
//! Events reach this bus only after the outbox has stored the record they
//! describe, so an observer that reloads an entity on an event always sees
//! at least that version.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use unictl_domain::error::UnictlError;
use unictl_domain::event::Event;
use unictl_domain::id::EntityId;

use crate::ports::EventPublisher;

/// Broadcasts every published [`Event`] to the current subscribers.
///
/// Nobody listening is not an error. A subscriber more than `capacity`
/// events behind loses the oldest ones and sees
/// [`broadcast::error::RecvError::Lagged`].
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
    published: AtomicU64,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published since start-up, delivered or not.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Whether `event` concerns `entity`. `None` matches every event.
#[must_use]
pub fn concerns(event: &Event, entity: Option<&EntityId>) -> bool {
    entity.is_none_or(|id| event.entity_id.as_ref() == Some(id))
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), UnictlError>> + Send {
        self.published.fetch_add(1, Ordering::Relaxed);
        let event_type = event.event_type;
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(%event_type, receivers, "event published"),
            Err(_) => tracing::trace!(%event_type, "event published without subscribers"),
        }
        async { Ok(()) }
    }
}
