//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! Distributes each [`Event`] to every subscriber **without awaiting** its
//! processing.
//!
//! ## Guarantees
//! - [`SubscriberSet::emit`] returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and reported (isolation).
//!
//! ## Not guaranteed
//! - Global ordering across subscribers.
//! - Delivery when a subscriber's queue overflows (the event is dropped
//!   for that subscriber only).
//!
//! ```text
//!    emit(&Event)
//!        │                       (Arc-clone per subscriber)
//!        ├───────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├───────────► [queue S2] ─► worker S2 ─► on_event()
//!        └───────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};

use super::Subscribe;

/// Per-subscriber channel with metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sub);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = s.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        eprintln!("[gearvisor] subscriber '{}' panicked: {:?}", s.name(), panic);
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Spawns the per-process listener bridging `bus` into this set.
    ///
    /// Call once per process after constructing the set. A lagging listener
    /// skips the oldest events and keeps going; the task ends when the bus
    /// is dropped.
    pub fn spawn_listener(self: &Arc<Self>, bus: &Bus) {
        let mut rx = bus.subscribe();
        let set = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Fans one event out to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is full or closed the event is dropped for
    /// it and a warning goes to stderr.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    eprintln!("[gearvisor] subscriber '{}' dropped event: queue full", channel.name);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!(
                        "[gearvisor] subscriber '{}' dropped event: worker closed",
                        channel.name
                    );
                }
            }
        }
    }

    /// Number of attached subscribers.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no subscribers are attached.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    #[tokio::test]
    async fn test_emit_fans_out_to_all_subscribers() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(vec![
            Arc::new(Counter(a.clone())),
            Arc::new(Counter(b.clone())),
        ]);

        set.emit(&Event::new(EventKind::ManagerStarted));
        set.emit(&Event::new(EventKind::ShutdownRequested));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listener_bridges_bus_into_set() {
        let hits = Arc::new(AtomicUsize::new(0));
        let set = Arc::new(SubscriberSet::new(vec![Arc::new(Counter(hits.clone()))]));
        let bus = Bus::new(16);
        set.spawn_listener(&bus);

        // the receiver exists before publish; the listener task drains it
        bus.publish(Event::new(EventKind::ManagerStarted));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
