//! Runtime events: types and broadcast bus.
//!
//! Groups the event data model and the channel used to publish runtime
//! events from the supervisor, slot actors and the job dispatcher.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `SlotActor`, `JobDispatcher`, the
//!   validator pass, `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: one listener per process, fanning out to the
//!   [`SubscriberSet`](crate::subscribers::SubscriberSet).

mod bus;
mod event;

pub use bus::{Bus, DEFAULT_BUS_CAPACITY};
pub use event::{Event, EventKind};
