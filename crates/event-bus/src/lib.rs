//! In-memory event bus
//!
//! One broadcast channel per message type connects the session runtime
//! to its collaborators. Publishing is synchronous because some
//! publishers run inside an input-dispatch turn and cannot await.

use std::sync::Arc;

use tokio::sync::broadcast;

use tubedeck_core_types::TubeError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Simple in-memory bus carrying storage-change and picker/surface
/// messages between the session runtime and its collaborators.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Publish to every live subscriber. Errors when nobody is
    /// listening, which callers treat as droppable or fatal per message.
    pub fn publish_sync(&self, event: E) -> Result<(), TubeError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| TubeError::new(err.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}
