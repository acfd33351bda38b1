//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging observers into a pool
//! process (logging, metrics, alerting). Each subscriber gets:
//!
//! - a **dedicated worker task** draining a **per-subscriber bounded
//!   queue** (capacity via [`Subscribe::queue_capacity`]);
//! - **panic isolation**: a panicking subscriber loses only its own events.
//!
//! ## Rules
//! - Events arrive in FIFO order per subscriber.
//! - A slow subscriber only fills its own queue; on overflow the event is
//!   dropped for that subscriber alone.
//! - Subscribers never block publishers or each other.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use gearvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::JobSkipped) {
//!             // bump a metric
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of runtime events.
///
/// Implementations should use async I/O, handle their own errors, and
/// avoid panicking; panics are caught and reported to stderr.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's own worker task, never from the
    /// publisher's context.
    async fn on_event(&self, event: &Event);

    /// Short name used in overflow/panic diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's event queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
