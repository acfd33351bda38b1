//! # SlotActor: keeps one worker slot occupied.
//!
//! The supervisor spawns one actor per planned worker slot. Each actor
//! owns exactly one child process at a time and re-creates it for as long
//! as the slot is wanted:
//!
//! ```text
//! loop {
//!   ├─► cancelled?                     break
//!   ├─► launch child (record pid, publish WorkerSpawned)
//!   ├─► wait for exit
//!   │     └─ on cancellation: SIGTERM ─► grace ─► SIGKILL ─► reap
//!   ├─► remove pid, publish WorkerExited
//!   ├─► cancelled?                     break
//!   └─► delay = splay.delay()
//!         └─ publish RespawnScheduled, cancellable sleep
//! }
//! ```
//!
//! ## Rules
//! - A voluntary child exit (lifetime or run budget reached) is not a
//!   failure; it triggers the same respawn path as a crash.
//! - Respawn delays are drawn fresh per respawn, so a fleet recycling at
//!   once spreads out instead of herding.
//! - Cancellation is honored at safe points only: before launching, after
//!   reaping, and during the respawn sleep. A running child is terminated
//!   gracefully and reaped before the actor exits.

use std::time::{Duration, SystemTime};
use std::sync::Arc;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::plan::WorkerGroup;
use crate::policies::SplayPolicy;

use super::launcher::{ChildExit, ChildHandle, LaunchRole, Launcher};
use super::process::{ProcessTable, WorkerProcess};

/// Pause before retrying a failed launch.
const SPAWN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Supervises one worker slot of a group.
pub struct SlotActor {
    /// Group this slot belongs to.
    pub group: WorkerGroup,
    /// Process-control seam.
    pub launcher: Arc<dyn Launcher>,
    /// Respawn delay policy.
    pub splay: SplayPolicy,
    /// Graceful-stop window before SIGKILL escalation.
    pub grace: Duration,
    /// Event bus of the supervisor process.
    pub bus: Bus,
    /// Shared live-process table.
    pub table: Arc<ProcessTable>,
}

impl SlotActor {
    /// Runs the slot until the runtime token cancels.
    pub async fn run(self, runtime_token: CancellationToken) {
        let label = self.group.label().to_string();

        loop {
            if runtime_token.is_cancelled() {
                break;
            }

            let role = LaunchRole::Worker { functions: self.group.functions.clone() };
            let mut child = match self.launcher.launch(role).await {
                Ok(child) => child,
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::SpawnFailed)
                            .with_group(label.as_str())
                            .with_reason(e.to_string())
                            .with_delay(SPAWN_RETRY_DELAY),
                    );
                    let nap = tokio::time::sleep(SPAWN_RETRY_DELAY);
                    select! {
                        _ = nap => continue,
                        _ = runtime_token.cancelled() => break,
                    }
                }
            };

            let pid = child.pid();
            self.table
                .insert(WorkerProcess {
                    pid,
                    group: label.clone(),
                    functions: self.group.functions.clone(),
                    started_at: SystemTime::now(),
                })
                .await;
            self.bus
                .publish(Event::new(EventKind::WorkerSpawned).with_pid(pid).with_group(label.as_str()));

            let exit = select! {
                res = child.wait() => res,
                _ = runtime_token.cancelled() => self.stop_child(child.as_mut()).await,
            };

            self.table.remove(pid).await;
            let mut ev = Event::new(EventKind::WorkerExited).with_pid(pid).with_group(label.as_str());
            match &exit {
                Ok(ChildExit { code: Some(code), .. }) => ev = ev.with_status(*code),
                Ok(other) => ev = ev.with_reason(other.describe()),
                Err(e) => ev = ev.with_reason(format!("wait failed: {e}")),
            }
            self.bus.publish(ev);

            if runtime_token.is_cancelled() {
                break;
            }

            let delay = self.splay.delay();
            if delay > Duration::ZERO {
                self.bus.publish(
                    Event::new(EventKind::RespawnScheduled)
                        .with_group(label.as_str())
                        .with_delay(delay),
                );
                let nap = tokio::time::sleep(delay);
                select! {
                    _ = nap => {}
                    _ = runtime_token.cancelled() => break,
                }
            }
        }
    }

    /// Graceful child stop: SIGTERM, wait out the grace window, escalate
    /// to SIGKILL, and always reap.
    async fn stop_child(&self, child: &mut dyn ChildHandle) -> std::io::Result<ChildExit> {
        child.terminate();
        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(res) => res,
            Err(_) => {
                child.kill();
                child.wait().await
            }
        }
    }
}
