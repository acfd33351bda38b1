//! # JobDispatcher: the per-worker fetch/execute loop.
//!
//! Runs inside each worker process. Owns the broker connection, resolves
//! incoming jobs to handlers, invokes them, and emits log records under
//! the uniform trimming policy. Self-terminates when its own lifetime or
//! run-count budget is exhausted, or when a stop is requested.
//!
//! ## Loop shape
//! ```text
//! connect ─► register functions (priority order) ─► loop {
//!   ├─► stop requested?          break StopRequested
//!   ├─► lifetime exceeded?       break LifetimeReached
//!   ├─► run budget exhausted?    break RunsExhausted
//!   └─► fetch_job(timeout)
//!         ├─ Job     dispatch (resolve ─► instantiate ─► run ─► logs ─► complete)
//!         ├─ NoJob / IoWait      re-poll
//!         ├─ NotConnected        sleep 5s (cancellable), re-poll
//!         └─ other error         log, re-poll
//! } ─► unregister_all ─► exit
//! ```
//!
//! ## Rules
//! - Budgets are checked once per iteration, before fetching; the bounded
//!   fetch timeout is what keeps an idle worker re-checking them.
//! - A stop request is honored at the top of the loop only: an in-flight
//!   job always completes and its result is delivered first.
//! - Per-job failures (unknown function, unusable handler) are logged and
//!   skipped; they never terminate the worker and never count toward the
//!   run budget.
//! - Every exit path is deliberate and reports an [`ExitReason`]; the
//!   supervisor treats it as a respawn trigger, not a failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Fetch, Job};
use crate::config::ResolvedConfig;
use crate::dispatch::job_log::render_value;
use crate::error::{BrokerError, DispatchError};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRegistry;
use crate::plan::{registration_order, WorkerPlanEntry};

/// Sleep before re-polling a broker with no active connections.
const OUTAGE_BACKOFF: Duration = Duration::from_secs(5);

/// Why a dispatch loop ended. Deliberate, expected terminations; the
/// supervisor respawns after any of them (subject to shutdown state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The worker outlived its configured lifetime.
    LifetimeReached,
    /// The worker executed its configured maximum number of jobs.
    RunsExhausted,
    /// An external stop request was observed.
    StopRequested,
}

/// The per-worker dispatch engine.
///
/// Built once per worker process and consumed by [`run`](Self::run).
pub struct JobDispatcher {
    cfg: ResolvedConfig,
    plan: Vec<WorkerPlanEntry>,
    functions: Vec<String>,
    broker: Box<dyn Broker>,
    registry: Arc<dyn HandlerRegistry>,
    bus: Bus,
    executed: u32,
}

impl JobDispatcher {
    /// Creates a dispatcher serving `functions` (bare names) out of the
    /// planned entries.
    pub fn new(
        cfg: ResolvedConfig,
        plan: Vec<WorkerPlanEntry>,
        functions: Vec<String>,
        broker: Box<dyn Broker>,
        registry: Arc<dyn HandlerRegistry>,
        bus: Bus,
    ) -> Self {
        Self {
            cfg,
            plan,
            functions,
            broker,
            registry,
            bus,
            executed: 0,
        }
    }

    /// Connects, registers, and runs the dispatch loop to completion.
    ///
    /// Returns the exit reason on a deliberate termination. Transport
    /// errors during connect/registration surface as `Err`; the supervisor
    /// observes the non-zero exit and respawns with splay either way.
    pub async fn run(mut self, stop: CancellationToken) -> Result<ExitReason, BrokerError> {
        for server in &self.cfg.servers {
            self.bus.publish(Event::new(EventKind::ServerAdded).with_server(server.as_str()));
        }
        self.broker.connect(&self.cfg.servers).await?;

        for entry in registration_order(&self.plan, &self.functions) {
            let name = self.cfg.broker_name(&entry.function);
            let mut ev = Event::new(EventKind::FunctionRegistered).with_function(name.as_str());
            if let Some(t) = entry.timeout {
                ev = ev.with_timeout(t);
            }
            self.bus.publish(ev);
            self.broker.register_function(&name, entry.timeout).await?;
        }

        let started = Instant::now();
        let reason = loop {
            if stop.is_cancelled() {
                break ExitReason::StopRequested;
            }
            if let Some(lifetime) = self.cfg.max_worker_lifetime {
                if started.elapsed() >= lifetime {
                    self.bus.publish(Event::new(EventKind::LifetimeReached));
                    break ExitReason::LifetimeReached;
                }
            }
            if let Some(limit) = self.cfg.max_runs_per_worker {
                if self.executed >= limit {
                    self.bus
                        .publish(Event::new(EventKind::RunLimitReached).with_runs(self.executed, limit));
                    break ExitReason::RunsExhausted;
                }
            }

            match self.broker.fetch_job(self.cfg.fetch_timeout).await {
                Ok(Fetch::Job(job)) => self.dispatch(job).await,
                Ok(Fetch::NoJob) | Ok(Fetch::IoWait) => {}
                Err(e) if e.wants_backoff() => {
                    self.bus.publish(
                        Event::new(EventKind::BrokerBackoff)
                            .with_delay(OUTAGE_BACKOFF)
                            .with_reason(e.to_string()),
                    );
                    let nap = tokio::time::sleep(OUTAGE_BACKOFF);
                    select! {
                        _ = nap => {}
                        _ = stop.cancelled() => {}
                    }
                }
                Err(e) => {
                    self.bus
                        .publish(Event::new(EventKind::BrokerFault).with_reason(e.to_string()));
                }
            }
        };

        let _ = self.broker.unregister_all().await;
        Ok(reason)
    }

    /// Wrapper around one job: resolve, invoke, log, complete.
    ///
    /// Absorbs every per-job failure. The executed-jobs counter increments
    /// only when a handler actually ran; jobs skipped for resolution
    /// failures never count toward the run budget.
    async fn dispatch(&mut self, job: Job) {
        let bare = self.cfg.bare_name(&job.function).to_string();

        let handle = match self.registry.resolve(&bare) {
            Some(h) => h,
            None => {
                self.skip(&job, &bare, &DispatchError::HandlerNotFound { function: bare.clone() });
                return;
            }
        };
        let handler = match self.registry.instantiate(&handle) {
            Ok(h) => h,
            Err(e) => {
                self.skip(&job, &bare, &e);
                return;
            }
        };

        self.bus.publish(
            Event::new(EventKind::JobStarted)
                .with_handle(job.handle.as_str())
                .with_function(bare.as_str()),
        );
        self.bus.publish(
            Event::new(EventKind::JobWorkload)
                .with_handle(job.handle.as_str())
                .with_line(job.workload_text().into_owned()),
        );

        let result = handler.run(&job).await;
        self.executed += 1;

        for record in handler.take_log() {
            for line in render_value(&record) {
                self.bus.publish(
                    Event::new(EventKind::JobLogLine).with_handle(job.handle.as_str()).with_line(line),
                );
            }
        }
        for line in render_value(&result) {
            self.bus.publish(
                Event::new(EventKind::JobResultLine).with_handle(job.handle.as_str()).with_line(line),
            );
        }

        if let Err(e) = self.broker.complete_job(&job, &result).await {
            self.bus.publish(Event::new(EventKind::BrokerFault).with_reason(e.to_string()));
        }
    }

    fn skip(&self, job: &Job, function: &str, why: &DispatchError) {
        self.bus.publish(
            Event::new(EventKind::JobSkipped)
                .with_handle(job.handle.as_str())
                .with_function(function)
                .with_reason(why.to_string()),
        );
    }
}
