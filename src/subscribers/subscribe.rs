//! Subscriber trait for runtime events.

use async_trait::async_trait;

use crate::events::Event;

/// Asynchronous consumer of runtime [`Event`]s.
///
/// Implementations run on their own worker task; a slow subscriber delays
/// only its own queue, never the publishers or other subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Returns a stable name used in drop/panic diagnostics.
    fn name(&self) -> &'static str {
        "subscriber"
    }

    /// Capacity of this subscriber's event queue.
    ///
    /// Events beyond this backlog are dropped for this subscriber only.
    fn queue_capacity(&self) -> usize {
        256
    }

    /// Handles one event.
    async fn on_event(&self, event: &Event);
}
