//! # Pool: process supervision and the per-process entry point.
//!
//! The supervisor half of the crate:
//!
//! - [`Pool`] — the façade an application embeds. One call to
//!   [`Pool::run`] makes the process become whatever the environment says
//!   it is: the supervisor, a dispatch-loop worker, or the pre-flight
//!   validator.
//! - [`Supervisor`] — owns the parent process: slot actors, the live
//!   process table, signal-driven shutdown.
//! - [`Launcher`] / [`ExecLauncher`] — the process-control seam and its
//!   spawn+exec implementation.
//! - [`validate_functions`] — the check the validator child runs.
//!
//! ## Process topology
//! ```text
//! application binary
//!   └─ Pool::run()
//!        ├─ (no role env)          Supervisor ── spawns ──┐
//!        ├─ GEARVISOR_ROLE=validator   resolve all functions, exit 0/1
//!        └─ GEARVISOR_ROLE=worker      JobDispatcher loop      ◄┘
//! ```
//!
//! Every process wires its own event bus and log sink, so worker log
//! lines interleave in the shared destination tagged by pid.

mod launcher;
mod pidfile;
mod process;
mod shutdown;
mod slot;
mod supervisor;
mod validator;

pub use launcher::{
    ChildExit, ChildHandle, ExecLauncher, LaunchRole, Launcher, CONFIG_ENV, FUNCTIONS_ENV,
    ROLE_ENV,
};
pub use pidfile::PidFile;
pub use process::{ProcessTable, WorkerProcess};
pub use supervisor::Supervisor;
pub use validator::{validate_functions, VALIDATION_WAIT};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::BrokerFactory;
use crate::config::ResolvedConfig;
use crate::dispatch::JobDispatcher;
use crate::error::PoolError;
use crate::events::Bus;
use crate::handlers::HandlerRegistry;
use crate::plan;
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};

use launcher::ProcessRole;

/// Beat given to the log sink's queue before a child-role process leaves.
const LOG_DRAIN: Duration = Duration::from_millis(100);

/// The embeddable pool: configuration plus the two collaborators every
/// process needs.
///
/// Construct it the same way in every process (the binary re-executes
/// itself for workers), then call [`run`](Self::run) last — in child
/// roles the call returns only when the process is done.
pub struct Pool {
    cfg: ResolvedConfig,
    registry: Arc<dyn HandlerRegistry>,
    broker_factory: Arc<dyn BrokerFactory>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Pool {
    /// Creates a pool over the given handler registry and broker factory.
    pub fn new(
        cfg: ResolvedConfig,
        registry: Arc<dyn HandlerRegistry>,
        broker_factory: Arc<dyn BrokerFactory>,
    ) -> Self {
        Self { cfg, registry, broker_factory, subscribers: Vec::new() }
    }

    /// Attaches extra event subscribers (metrics, alerting) alongside the
    /// built-in log sink.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Becomes whatever this process was started as.
    ///
    /// - **Supervisor** (no role in the environment): validates, spawns
    ///   and supervises workers until shutdown. With `dump_config` set,
    ///   prints the resolved configuration and returns without starting
    ///   anything.
    /// - **Worker**: runs the dispatch loop for the handed-off function
    ///   set, then returns; a clean budget exit is `Ok`.
    /// - **Validator**: resolves every planned function; an unresolved
    ///   one is the non-zero-exit error the supervisor is watching for.
    pub async fn run(self) -> Result<(), PoolError> {
        match launcher::role_from_env()? {
            ProcessRole::Supervisor => self.run_supervisor().await,
            ProcessRole::Worker { cfg, functions } => self.run_worker(*cfg, functions).await,
            ProcessRole::Validator { cfg } => self.run_validator(*cfg).await,
        }
    }

    /// Builds this process's bus, attaches the configured log sink plus
    /// user subscribers, and bridges them.
    fn wire_observability(&self, cfg: &ResolvedConfig) -> Result<Bus, PoolError> {
        let bus = Bus::default();
        let mut subs = self.subscribers.clone();
        subs.push(Arc::new(LogWriter::from_config(cfg)?));
        let set = Arc::new(SubscriberSet::new(subs));
        set.spawn_listener(&bus);
        Ok(bus)
    }

    async fn run_supervisor(self) -> Result<(), PoolError> {
        let cfg = self.cfg.clone();
        if cfg.dump_config {
            let rendered = serde_json::to_string_pretty(&cfg)
                .unwrap_or_else(|_| format!("{cfg:#?}"));
            println!("{rendered}");
            return Ok(());
        }

        let bus = self.wire_observability(&cfg)?;
        let exec = Arc::new(ExecLauncher::from_config(&cfg)?);
        let supervisor = Supervisor::new(cfg, bus, exec);
        let result = supervisor.run().await;
        tokio::time::sleep(LOG_DRAIN).await;
        result
    }

    async fn run_worker(
        self,
        cfg: ResolvedConfig,
        functions: Vec<String>,
    ) -> Result<(), PoolError> {
        let bus = self.wire_observability(&cfg)?;
        let entries = plan::plan(&cfg)?;

        // The worker's own SIGTERM becomes the cooperative stop flag; the
        // in-flight job still completes before the loop honors it.
        let stop = CancellationToken::new();
        {
            let stop = stop.clone();
            tokio::spawn(async move {
                let _ = shutdown::wait_for_stop_signal().await;
                stop.cancel();
            });
        }

        let broker = self.broker_factory.create();
        let dispatcher =
            JobDispatcher::new(cfg, entries, functions, broker, Arc::clone(&self.registry), bus);
        let result = dispatcher.run(stop).await;
        tokio::time::sleep(LOG_DRAIN).await;

        // A budget or stop exit is the deliberate, zero-status path.
        result.map(|_reason| ()).map_err(PoolError::from)
    }

    async fn run_validator(self, cfg: ResolvedConfig) -> Result<(), PoolError> {
        let bus = self.wire_observability(&cfg)?;
        let entries = plan::plan(&cfg)?;
        let result = validate_functions(&entries, self.registry.as_ref(), &bus);
        tokio::time::sleep(LOG_DRAIN).await;
        result
    }
}
