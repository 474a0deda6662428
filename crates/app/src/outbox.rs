//! Ordered write-behind outbox.
//!
//! Every change to an entity record is queued here together with the event
//! describing it. A single writer task drains the queue in order: it stores
//! the record, then publishes the event. Jobs are enqueued while the registry
//! lock is held, so the store and the event stream observe changes to one
//! entity in the order they were made.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use unictl_domain::entity::Entity;
use unictl_domain::error::UnictlError;
use unictl_domain::event::Event;
use unictl_domain::id::EntityId;

use crate::ports::{EntityStore, EventPublisher};

/// The writer task has stopped.
#[derive(Debug, thiserror::Error)]
#[error("write-behind outbox is closed")]
pub struct OutboxClosed;

impl From<OutboxClosed> for UnictlError {
    fn from(err: OutboxClosed) -> Self {
        Self::Storage(Box::new(err))
    }
}

type Ack = oneshot::Sender<Result<(), UnictlError>>;

enum Job {
    Save {
        entity: Entity,
        event: Event,
        ack: Option<Ack>,
    },
    Delete {
        id: EntityId,
        event: Event,
        ack: Option<Ack>,
    },
    Flush(oneshot::Sender<()>),
}

/// Pending result of an acknowledged write.
pub struct Pending(oneshot::Receiver<Result<(), UnictlError>>);

impl Pending {
    /// Wait until the record is stored and the event published.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or [`OutboxClosed`] if the writer is gone.
    pub async fn wait(self) -> Result<(), UnictlError> {
        self.0.await.map_err(|_| OutboxClosed)?
    }
}

/// Cloneable handle to the writer task.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Save { entity, .. } => write!(f, "Save({})", entity.id),
            Self::Delete { id, .. } => write!(f, "Delete({id})"),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl Outbox {
    /// Spawn the writer task. It runs until every handle is dropped.
    pub fn spawn<S, P>(store: S, publisher: P) -> (Self, JoinHandle<()>)
    where
        S: EntityStore + Send + Sync + 'static,
        P: EventPublisher + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(drain(store, publisher, receiver));
        (Self { sender }, writer)
    }

    /// Queue a save without waiting. A store failure is logged and the event
    /// is published anyway, since the in-memory record already changed.
    pub fn save(&self, entity: Entity, event: Event) {
        self.send(Job::Save {
            entity,
            event,
            ack: None,
        });
    }

    /// Queue a save and get a handle to wait for it. The event is only
    /// published if the store accepted the record.
    #[must_use]
    pub fn save_acked(&self, entity: Entity, event: Event) -> Pending {
        let (ack, pending) = oneshot::channel();
        self.send(Job::Save {
            entity,
            event,
            ack: Some(ack),
        });
        Pending(pending)
    }

    #[must_use]
    pub fn delete_acked(&self, id: EntityId, event: Event) -> Pending {
        let (ack, pending) = oneshot::channel();
        self.send(Job::Delete {
            id,
            event,
            ack: Some(ack),
        });
        Pending(pending)
    }

    /// Wait until every job queued before this call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Job::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, job: Job) {
        if let Err(err) = self.sender.send(job) {
            tracing::warn!(job = ?err.0, "outbox writer stopped, dropping job");
        }
    }
}

async fn drain<S, P>(store: S, publisher: P, mut receiver: mpsc::UnboundedReceiver<Job>)
where
    S: EntityStore,
    P: EventPublisher,
{
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Save { entity, event, ack } => {
                let id = entity.id.clone();
                let stored = store.save(entity).await.map(drop);
                complete(&publisher, &id, stored, event, ack).await;
            }
            Job::Delete { id, event, ack } => {
                let deleted = store.delete(&id).await;
                complete(&publisher, &id, deleted, event, ack).await;
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("outbox writer finished");
}

async fn complete<P: EventPublisher>(
    publisher: &P,
    id: &EntityId,
    stored: Result<(), UnictlError>,
    event: Event,
    ack: Option<Ack>,
) {
    match stored {
        Ok(()) => {
            publish(publisher, event).await;
            if let Some(ack) = ack {
                let _ = ack.send(Ok(()));
            }
        }
        Err(err) => match ack {
            Some(ack) => {
                let _ = ack.send(Err(err));
            }
            None => {
                tracing::warn!(entity_id = %id, error = %err, "failed to persist entity");
                publish(publisher, event).await;
            }
        },
    }
}

async fn publish<P: EventPublisher>(publisher: &P, event: Event) {
    let event_type = event.event_type;
    if let Err(err) = publisher.publish(event).await {
        tracing::warn!(%event_type, error = %err, "failed to publish event");
    }
}
