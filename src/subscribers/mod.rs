//! # Event subscribers.
//!
//! The [`Subscribe`] trait plus the built-in pieces every pool process
//! wires up:
//!
//! - [`SubscriberSet`] — non-blocking fan-out with per-subscriber bounded
//!   queues and panic isolation;
//! - [`LogWriter`] — the timestamped, leveled text sink (stdout or file).
//!
//! ```text
//! publisher ── Bus ── listener ── SubscriberSet ──┬── LogWriter
//!                                                 ├── metrics (yours)
//!                                                 └── ...
//! ```

mod log;
mod set;
mod subscriber;

pub use self::log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
