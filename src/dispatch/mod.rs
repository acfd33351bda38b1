//! # Job dispatch: the worker-process half of the pool.
//!
//! Everything in this module runs inside a worker process:
//!
//! - [`JobDispatcher`] — the blocking fetch/execute loop against the
//!   broker, with per-worker lifetime and run-count budgets;
//! - [`render_value`] and friends — the uniform log-record policy
//!   (non-scalars multi-line, scalars truncated at [`MAX_LOG_CHARS`]).
//!
//! The supervisor half lives in [`pool`](crate::pool).

mod job_log;
mod worker;

pub use job_log::{clip, render_value, MAX_LOG_CHARS, TRUNCATION_MARKER};
pub use worker::{ExitReason, JobDispatcher};
