//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Publishers
//! (supervisor, slot actors, the dispatcher) call [`Bus::publish`] without
//! blocking; the single listener in each process fans events out to the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receiver the event
//!   is dropped.
//! - The ring buffer holds the most recent `capacity` events; a lagging
//!   receiver observes `RecvError::Lagged(n)` and skips the `n` oldest.
//! - Events are process-local. Worker processes have their own bus; nothing
//!   crosses the process boundary except the log sink's output.

use tokio::sync::broadcast;

use super::event::Event;

/// Capacity used when a caller does not care.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver observing subsequent events only.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
