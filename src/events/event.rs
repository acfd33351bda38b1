//! # Runtime events emitted by the supervisor and worker processes.
//!
//! [`EventKind`] classifies everything the pool reports about itself:
//!
//! - **Supervisor events**: startup, validation, child spawns/exits,
//!   respawn scheduling, shutdown progress.
//! - **Worker events**: broker registration, per-job flow, budget
//!   exhaustion, broker backoff.
//! - **Delivery events**: subscriber overflow/panic bookkeeping.
//!
//! [`Event`] carries the metadata for its kind; unset fields stay `None`.
//! Every kind maps to a [`Verbosity`] level via [`EventKind::level`], which
//! is what the log sink filters on.
//!
//! ## Ordering
//! Each event gets a process-local monotonic sequence number (`seq`).
//! Events never cross process boundaries, so `seq` totals the order within
//! one supervisor or one worker.
//!
//! ## Example
//! ```rust
//! use gearvisor::{Event, EventKind, Verbosity};
//!
//! let ev = Event::new(EventKind::JobStarted)
//!     .with_handle("H:host:42")
//!     .with_function("do-stuff");
//!
//! assert_eq!(ev.kind, EventKind::JobStarted);
//! assert_eq!(ev.kind.level(), Verbosity::WorkerInfo);
//! assert_eq!(ev.handle.as_deref(), Some("H:host:42"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::config::Verbosity;

/// Process-local sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Supervisor lifecycle ===
    /// Supervisor finished startup and owns the pool.
    ///
    /// Sets: `pid`.
    ManagerStarted,

    /// Startup aborted before any steady-state worker was spawned.
    ///
    /// Sets: `reason`.
    StartupAborted,

    /// The pre-flight validator could not resolve a configured function.
    ///
    /// Sets: `function`.
    ValidationFailed,

    /// A worker process was forked for a group.
    ///
    /// Sets: `pid`, `group`.
    WorkerSpawned,

    /// A worker process exited and was reaped.
    ///
    /// Sets: `pid`, `group`, `status` (exit code when the child exited
    /// normally), `reason` (signal description otherwise).
    WorkerExited,

    /// A replacement worker was scheduled after a splay delay.
    ///
    /// Sets: `group`, `delay_ms`.
    RespawnScheduled,

    /// A worker process could not be started; another attempt follows.
    ///
    /// Sets: `group`, `reason`, `delay_ms`.
    SpawnFailed,

    /// A stop signal was observed; the pool is shutting down.
    ShutdownRequested,

    /// Every worker exited within the grace window.
    AllStoppedWithin,

    /// The grace window elapsed with workers still alive.
    ///
    /// Sets: `reason` (stuck group labels).
    GraceExceeded,

    // === Worker / dispatch flow ===
    /// A job-server address was added to the worker's broker connection.
    ///
    /// Sets: `server`.
    ServerAdded,

    /// A function was registered with the broker.
    ///
    /// Sets: `function` (broker-visible name), `timeout_ms` if configured.
    FunctionRegistered,

    /// A job was received and its handler resolved; execution begins.
    ///
    /// Sets: `handle`, `function`.
    JobStarted,

    /// The incoming job's workload payload.
    ///
    /// Sets: `handle`, `line`.
    JobWorkload,

    /// One handler-produced log record.
    ///
    /// Sets: `handle`, `line`.
    JobLogLine,

    /// One line of the job's final result.
    ///
    /// Sets: `handle`, `line`.
    JobResultLine,

    /// A job was dropped without execution (no usable handler).
    ///
    /// Sets: `handle`, `function`, `reason`.
    JobSkipped,

    /// The broker is unreachable; the worker sleeps before re-polling.
    ///
    /// Sets: `delay_ms`, `reason`.
    BrokerBackoff,

    /// A non-fatal broker failure outside the fetch path (registration,
    /// completion).
    ///
    /// Sets: `reason`.
    BrokerFault,

    /// The worker outlived its lifetime budget and is exiting.
    LifetimeReached,

    /// The worker hit its run-count budget and is exiting.
    ///
    /// Sets: `runs`, `limit`.
    RunLimitReached,

    // === Delivery bookkeeping ===
    /// A subscriber's queue was full or closed; the event was dropped for
    /// that subscriber only.
    ///
    /// Sets: `reason`.
    SubscriberOverflow,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `reason`.
    SubscriberPanicked,
}

impl EventKind {
    /// Verbosity level at which this event is written to the log.
    pub fn level(&self) -> Verbosity {
        match self {
            EventKind::StartupAborted
            | EventKind::ValidationFailed
            | EventKind::SpawnFailed
            | EventKind::JobSkipped
            | EventKind::BrokerFault
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => Verbosity::Info,

            EventKind::ManagerStarted
            | EventKind::WorkerSpawned
            | EventKind::WorkerExited
            | EventKind::RespawnScheduled
            | EventKind::ShutdownRequested
            | EventKind::AllStoppedWithin
            | EventKind::GraceExceeded
            | EventKind::BrokerBackoff => Verbosity::ProcInfo,

            EventKind::ServerAdded
            | EventKind::FunctionRegistered
            | EventKind::JobStarted
            | EventKind::JobLogLine
            | EventKind::LifetimeReached
            | EventKind::RunLimitReached => Verbosity::WorkerInfo,

            EventKind::JobWorkload | EventKind::JobResultLine => Verbosity::Debug,
        }
    }
}

/// Runtime event with optional metadata.
///
/// `seq` orders events within one process; `at` is the wall-clock stamp the
/// log sink prints. The remaining fields are set per [`EventKind`].
#[derive(Debug, Clone)]
pub struct Event {
    /// Process-local, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Process id of the subject (supervisor or child).
    pub pid: Option<u32>,
    /// Worker-group label (`pool` or a function name).
    pub group: Option<Arc<str>>,
    /// Function name.
    pub function: Option<Arc<str>>,
    /// Broker job handle.
    pub handle: Option<Arc<str>>,
    /// Job-server address.
    pub server: Option<Arc<str>>,
    /// One rendered log/workload/result line.
    pub line: Option<Arc<str>>,
    /// Human-readable reason or diagnostic.
    pub reason: Option<Arc<str>>,
    /// Child exit code.
    pub status: Option<i32>,
    /// Delay before the next action, in milliseconds.
    pub delay_ms: Option<u64>,
    /// Advisory timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Jobs executed so far.
    pub runs: Option<u32>,
    /// Configured run-count ceiling.
    pub limit: Option<u32>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            group: None,
            function: None,
            handle: None,
            server: None,
            line: None,
            reason: None,
            status: None,
            delay_ms: None,
            timeout_ms: None,
            runs: None,
            limit: None,
        }
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a worker-group label.
    #[inline]
    pub fn with_group(mut self, group: impl Into<Arc<str>>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Attaches a function name.
    #[inline]
    pub fn with_function(mut self, function: impl Into<Arc<str>>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Attaches a broker job handle.
    #[inline]
    pub fn with_handle(mut self, handle: impl Into<Arc<str>>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Attaches a job-server address.
    #[inline]
    pub fn with_server(mut self, server: impl Into<Arc<str>>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Attaches one rendered output line.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a child exit code.
    #[inline]
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches an advisory timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches the executed-runs counter and its ceiling.
    #[inline]
    pub fn with_runs(mut self, runs: u32, limit: u32) -> Self {
        self.runs = Some(runs);
        self.limit = Some(limit);
        self
    }
}
