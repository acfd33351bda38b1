//! Respawn policies.
//!
//! The only knob the supervisor exposes is **when** a replacement worker
//! starts after a child exit: [`SplayPolicy`] draws a uniform random delay
//! so fleets of recycling workers do not restart in lockstep.

mod splay;

pub use splay::SplayPolicy;
