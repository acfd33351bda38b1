//! # gearvisor
//!
//! **Gearvisor** is a process-based worker-pool supervisor for
//! Gearman-style job queues.
//!
//! It runs a pool of worker processes pulling jobs from a distributed
//! queue broker, dispatches each job to an application-registered
//! handler, and keeps the pool healthy over long uptimes: configuration-
//! driven sizing of shared vs. dedicated worker slots, pre-flight handler
//! validation, crash and lifetime-based recycling with randomized restart
//! splay, and graceful signal-driven shutdown.
//!
//! ## Architecture
//! ```text
//!  PoolSettings (file + overrides)
//!        │ resolve()
//!        ▼
//!  ResolvedConfig ──► plan() ──► WorkerPlanEntry per function
//!        │                          │ worker_groups()
//!        ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (parent process)                                      │
//! │  - pid file, pre-flight Validator child (abort on failure)        │
//! │  - SlotActor per planned worker slot (spawn ► wait ► respawn)     │
//! │  - ProcessTable (pid → WorkerProcess), SplayPolicy respawn delay  │
//! │  - SIGINT/SIGTERM/SIGQUIT ─► cancel ─► SIGTERM children ─► grace  │
//! └──────┬──────────────┬──────────────┬─────────────────────────────┘
//!        ▼              ▼              ▼        (spawn+exec, env handoff)
//!  ┌───────────┐  ┌───────────┐  ┌───────────┐
//!  │  worker   │  │  worker   │  │  worker   │   one OS process each
//!  │ dispatch  │  │ dispatch  │  │ dispatch  │
//!  │   loop    │  │   loop    │  │   loop    │
//!  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘
//!        │ fetch/complete              │
//!        ▼                             ▼
//!   job-queue broker         HandlerRegistry ─► JobHandler::run()
//! ```
//!
//! Each worker process runs its own [`JobDispatcher`] loop: fetch a job
//! (bounded blocking call), resolve its function to a handler, run it,
//! emit the handler's log records and the result under a uniform
//! size-bounded policy, and report completion. The worker recycles itself
//! when its lifetime or run-count budget is spent; the supervisor
//! observes the exit and respawns the slot after a `[0, splay]` delay.
//!
//! ## Events and logging
//! Every process publishes typed [`Event`]s onto its own [`Bus`]; a
//! [`SubscriberSet`] fans them out to [`Subscribe`] implementations. The
//! built-in [`LogWriter`] renders timestamped, leveled lines to stdout or
//! the configured log file, filtered by [`Verbosity`].
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use gearvisor::{Broker, BrokerError, Fetch, Job, MapRegistry, Pool, PoolSettings};
//!
//! struct TcpBroker;
//!
//! #[async_trait]
//! impl Broker for TcpBroker {
//!     async fn connect(&mut self, servers: &[String]) -> Result<(), BrokerError> {
//!         todo!("dial the job servers")
//!     }
//!     async fn register_function(
//!         &mut self,
//!         name: &str,
//!         timeout: Option<Duration>,
//!     ) -> Result<(), BrokerError> {
//!         todo!("CAN_DO / CAN_DO_TIMEOUT")
//!     }
//!     async fn fetch_job(&mut self, timeout: Duration) -> Result<Fetch, BrokerError> {
//!         todo!("GRAB_JOB with bounded wait")
//!     }
//!     async fn complete_job(&mut self, job: &Job, result: &Value) -> Result<(), BrokerError> {
//!         todo!("WORK_COMPLETE")
//!     }
//!     async fn unregister_all(&mut self) -> Result<(), BrokerError> {
//!         todo!("RESET_ABILITIES")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = PoolSettings::from_file("pool.toml")?.resolve()?;
//!
//!     let registry = MapRegistry::from_config(&cfg);
//!     // registry.register("app.workers.DoStuff", || Arc::new(DoStuff::default()));
//!
//!     let pool = Pool::new(
//!         cfg,
//!         Arc::new(registry),
//!         Arc::new(|| Box::new(TcpBroker) as Box<dyn Broker>),
//!     );
//!     // Becomes the supervisor here; worker processes re-enter through
//!     // the same call and branch on the environment handoff.
//!     pool.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                     |
//! |-----------------|---------------------------------------------------------|----------------------------------------|
//! | **Config**      | Mergeable sources, one immutable resolved plan input.   | [`PoolSettings`], [`ResolvedConfig`]   |
//! | **Planning**    | Shared vs. dedicated slot math, priorities, groups.     | [`WorkerPlanEntry`], [`WorkerGroup`]   |
//! | **Supervision** | Slot actors, process table, splay, graceful shutdown.   | [`Pool`], [`Supervisor`], [`SplayPolicy`] |
//! | **Dispatch**    | Fetch/execute loop, budgets, log trimming.              | [`JobDispatcher`], [`ExitReason`]      |
//! | **Collaborators** | Broker transport and handler lookup seams.            | [`Broker`], [`HandlerRegistry`]        |
//! | **Observability** | Typed events, fan-out, leveled log sink.              | [`Event`], [`Subscribe`], [`LogWriter`] |
//! | **Errors**      | Fatal vs. absorbed vs. retried taxonomy.                | [`PoolError`], [`DispatchError`]       |

pub mod broker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod plan;
pub mod policies;
pub mod pool;
pub mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use broker::{Broker, BrokerFactory, Fetch, Job};
pub use config::{FunctionConfig, PoolSettings, ResolvedConfig, Verbosity, DEFAULT_SERVER};
pub use dispatch::{ExitReason, JobDispatcher};
pub use error::{BrokerError, ConfigError, DispatchError, PoolError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{HandlerHandle, HandlerRegistry, JobHandler, MapRegistry};
pub use plan::{GroupKind, WorkerGroup, WorkerPlanEntry, MAX_PRIORITY, MIN_PRIORITY};
pub use policies::SplayPolicy;
pub use pool::{
    ChildExit, ChildHandle, ExecLauncher, LaunchRole, Launcher, PidFile, Pool, ProcessTable,
    Supervisor, WorkerProcess,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
