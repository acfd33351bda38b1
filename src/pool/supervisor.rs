//! # Supervisor: owns the parent process and keeps the pool alive.
//!
//! The [`Supervisor`] turns a worker plan into running OS processes and
//! keeps them running across crashes and voluntary recycling:
//!
//! ```text
//! run():
//!   plan ─► groups            (empty registry aborts: "no workers found")
//!   write pid file            (optional, plain-text own pid)
//!   pre-flight validation     (isolated child; failure aborts startup)
//!   spawn slot actors         one per planned worker slot
//!   drive shutdown:
//!     ├─ OS stop signal / stop token ─► cancel ─► wait with grace
//!     │     ├─ all reaped in time  ─► AllStoppedWithin
//!     │     └─ window exceeded     ─► GraceExceeded + stuck groups
//!     └─ all actors finished on their own ─► done
//!   kill the validator if it outlived its window
//! ```
//!
//! ## Rules
//! - Fatal startup conditions (bad plan, empty registry, failed
//!   validation) terminate before a single steady-state worker exists.
//! - Stop requests are cooperative: the runtime token fans out to slot
//!   actors, which SIGTERM their children and escalate only after the
//!   grace window.
//! - The live-process table is owned here; workers never see each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::{select, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::ResolvedConfig;
use crate::error::PoolError;
use crate::events::{Bus, Event, EventKind};
use crate::plan::{self, WorkerGroup};
use crate::policies::SplayPolicy;

use super::launcher::Launcher;
use super::pidfile::PidFile;
use super::process::ProcessTable;
use super::slot::SlotActor;
use super::validator::{self, VALIDATION_WAIT};
use super::shutdown;

/// Extra time past the grace window for SIGKILL escalation and reaping to
/// land before shutdown is declared stuck.
const GRACE_KILL_MARGIN: Duration = Duration::from_secs(5);

/// Coordinates slot actors, pre-flight validation and graceful shutdown.
pub struct Supervisor {
    /// Resolved pool configuration.
    pub cfg: ResolvedConfig,
    /// Event bus of the supervisor process.
    pub bus: Bus,
    /// How long to wait for the validator's verdict.
    pub validation_wait: Duration,
    launcher: Arc<dyn Launcher>,
    table: Arc<ProcessTable>,
    stop: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor over the given process-control seam.
    pub fn new(cfg: ResolvedConfig, bus: Bus, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            cfg,
            bus,
            validation_wait: VALIDATION_WAIT,
            launcher,
            table: Arc::new(ProcessTable::new()),
            stop: CancellationToken::new(),
        }
    }

    /// Token that stops the pool programmatically, equivalent to an OS
    /// stop signal.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// The live-process table (read-only interest: snapshots, counts).
    pub fn processes(&self) -> Arc<ProcessTable> {
        Arc::clone(&self.table)
    }

    /// Runs the pool until every worker exited or a stop was requested.
    pub async fn run(&self) -> Result<(), PoolError> {
        let entries = match plan::plan(&self.cfg) {
            Ok(entries) => entries,
            Err(e) => return self.abort(e.into()),
        };
        let groups = plan::worker_groups(&entries, &self.cfg);
        if groups.is_empty() {
            return self.abort(PoolError::NoWorkers);
        }

        let _pidfile = match &self.cfg.pid_file {
            Some(path) => match PidFile::write(path) {
                Ok(guard) => Some(guard),
                Err(e) => return self.abort(e.into()),
            },
            None => None,
        };

        self.bus
            .publish(Event::new(EventKind::ManagerStarted).with_pid(std::process::id()));

        let mut helper =
            match validator::preflight(self.launcher.as_ref(), self.validation_wait).await {
                Ok(helper) => helper,
                Err(e) => return self.abort(e),
            };

        let mut set = JoinSet::new();
        self.spawn_slot_actors(&mut set, groups);
        let result = self.drive_shutdown(&mut set).await;

        // A validator that outlived its window has no further purpose.
        if let Some(h) = helper.as_mut() {
            h.kill();
            let _ = h.wait().await;
        }

        result
    }

    /// Publishes the startup failure and returns it.
    fn abort(&self, err: PoolError) -> Result<(), PoolError> {
        self.bus
            .publish(Event::new(EventKind::StartupAborted).with_reason(err.to_string()));
        Err(err)
    }

    /// Spawns one slot actor per planned worker slot.
    fn spawn_slot_actors(&self, set: &mut JoinSet<()>, groups: Vec<WorkerGroup>) {
        let splay = SplayPolicy::new(self.cfg.restart_splay);
        for group in groups {
            for _slot in 0..group.count {
                let actor = SlotActor {
                    group: group.clone(),
                    launcher: Arc::clone(&self.launcher),
                    splay,
                    grace: self.cfg.grace,
                    bus: self.bus.clone(),
                    table: Arc::clone(&self.table),
                };
                set.spawn(actor.run(self.stop.child_token()));
            }
        }
    }

    /// Waits for a stop request (OS signal or token) or for all actors to
    /// finish on their own.
    async fn drive_shutdown(&self, set: &mut JoinSet<()>) -> Result<(), PoolError> {
        select! {
            _ = shutdown::wait_for_stop_signal() => {}
            _ = self.stop.cancelled() => {}
            _ = async { while set.join_next().await.is_some() {} } => return Ok(()),
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.stop.cancel();
        self.wait_all_with_grace(set).await
    }

    /// Joins all slot actors within the grace window (plus the kill
    /// margin); reports stuck groups past it.
    async fn wait_all_with_grace(&self, set: &mut JoinSet<()>) -> Result<(), PoolError> {
        let window = self.cfg.grace + GRACE_KILL_MARGIN;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(window, done).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.table.live_groups().await;
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")),
                );
                Err(PoolError::GraceExceeded { grace: self.cfg.grace, stuck })
            }
        }
    }
}
