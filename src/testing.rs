//! In-memory fakes for the collaborator seams, shared by the module tests.
//!
//! - [`FakeBroker`]/[`BrokerState`] — scripted fetch outcomes with full
//!   observation of connects, registrations, completions.
//! - [`RecordingHandler`] — a handler template producing fresh instances
//!   that share a run counter and canned result/log.
//! - [`FakeLauncher`] — process control without processes: scripted child
//!   exits, observable terminations and kills.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Fetch, Job};
use crate::error::{BrokerError, PoolError};
use crate::handlers::JobHandler;
use crate::pool::{ChildExit, ChildHandle, LaunchRole, Launcher};

// ---------------------------------------------------------------------
// Broker fake
// ---------------------------------------------------------------------

#[derive(Default)]
struct BrokerInner {
    script: VecDeque<Result<Fetch, BrokerError>>,
    connected: Vec<String>,
    registered: Vec<(String, Option<Duration>)>,
    completed: Vec<(String, Value)>,
    fetches: usize,
    unregistered: bool,
}

/// Shared, observable state behind a [`FakeBroker`].
#[derive(Clone, Default)]
pub struct BrokerState {
    inner: Arc<Mutex<BrokerInner>>,
}

impl BrokerState {
    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues one job assignment.
    pub fn push_job(&self, job: Job) {
        self.lock().script.push_back(Ok(Fetch::Job(job)));
    }

    /// Queues an arbitrary fetch outcome.
    pub fn push_fetch(&self, outcome: Result<Fetch, BrokerError>) {
        self.lock().script.push_back(outcome);
    }

    /// Completions reported so far, as (handle, result).
    pub fn completed(&self) -> Vec<(String, Value)> {
        self.lock().completed.clone()
    }

    /// Registrations in call order, as (broker name, timeout).
    pub fn registered(&self) -> Vec<(String, Option<Duration>)> {
        self.lock().registered.clone()
    }

    /// Addresses passed to connect.
    pub fn connected(&self) -> Vec<String> {
        self.lock().connected.clone()
    }

    /// Number of fetch calls made.
    pub fn fetches(&self) -> usize {
        self.lock().fetches
    }

    /// Whether the worker unregistered on its way out.
    pub fn unregistered(&self) -> bool {
        self.lock().unregistered
    }
}

/// Scripted broker: pops outcomes from the shared script; an empty script
/// cancels the paired stop token so dispatch-loop tests terminate.
pub struct FakeBroker {
    state: BrokerState,
    stop_when_empty: CancellationToken,
}

impl FakeBroker {
    pub fn new(state: BrokerState, stop_when_empty: CancellationToken) -> Self {
        Self { state, stop_when_empty }
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn connect(&mut self, servers: &[String]) -> Result<(), BrokerError> {
        self.state.lock().connected.extend(servers.iter().cloned());
        Ok(())
    }

    async fn register_function(
        &mut self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BrokerError> {
        self.state.lock().registered.push((name.to_string(), timeout));
        Ok(())
    }

    async fn fetch_job(&mut self, _timeout: Duration) -> Result<Fetch, BrokerError> {
        let next = {
            let mut inner = self.state.lock();
            inner.fetches += 1;
            inner.script.pop_front()
        };
        match next {
            Some(outcome) => outcome,
            None => {
                self.stop_when_empty.cancel();
                Ok(Fetch::NoJob)
            }
        }
    }

    async fn complete_job(&mut self, job: &Job, result: &Value) -> Result<(), BrokerError> {
        self.state.lock().completed.push((job.handle.clone(), result.clone()));
        Ok(())
    }

    async fn unregister_all(&mut self) -> Result<(), BrokerError> {
        self.state.lock().unregistered = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Handler fake
// ---------------------------------------------------------------------

/// Handler template: every [`instance`](Self::instance) shares the run
/// counter and returns the canned result and log.
#[derive(Clone)]
pub struct RecordingHandler {
    result: Value,
    log: Vec<Value>,
    runs: Arc<AtomicUsize>,
    on_run: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl RecordingHandler {
    /// Template whose instances return `result`.
    pub fn returning(result: Value) -> Self {
        Self { result, log: Vec::new(), runs: Arc::new(AtomicUsize::new(0)), on_run: None }
    }

    /// Adds canned log records.
    pub fn with_log(mut self, log: Vec<Value>) -> Self {
        self.log = log;
        self
    }

    /// Hook invoked at the start of every run (e.g. to cancel a token
    /// mid-execution).
    pub fn on_run(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_run = Some(Arc::new(hook));
        self
    }

    /// Shared run counter.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }

    /// Fresh handler instance, the way a registry factory would make one.
    pub fn instance(&self) -> Arc<dyn JobHandler> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn run(&self, _job: &Job) -> Value {
        if let Some(hook) = &self.on_run {
            hook();
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn take_log(&self) -> Vec<Value> {
        self.log.clone()
    }
}

// ---------------------------------------------------------------------
// Launcher fake
// ---------------------------------------------------------------------

/// How scripted worker children behave.
#[derive(Clone, Copy, Debug)]
pub enum WorkerScript {
    /// Every worker exits with the code as soon as it is waited on.
    ExitImmediately(i32),
    /// The first worker exits with the code; replacements run until
    /// stopped.
    ExitFirstThenRun(i32),
    /// Workers run until terminated or killed.
    RunUntilStopped,
}

/// How the scripted validator child behaves.
#[derive(Clone, Copy, Debug)]
pub enum ValidatorScript {
    /// Exits with the code immediately.
    Exit(i32),
    /// Never exits on its own; only a kill ends it.
    Hang,
}

#[derive(Default)]
struct LaunchInner {
    next_pid: u32,
    worker_pids: Vec<u32>,
    validator_pids: Vec<u32>,
    terminations: Vec<u32>,
    kills: Vec<u32>,
}

/// Scripted, fully observable [`Launcher`].
#[derive(Clone)]
pub struct FakeLauncher {
    worker_script: WorkerScript,
    validator_script: ValidatorScript,
    inner: Arc<Mutex<LaunchInner>>,
}

impl FakeLauncher {
    pub fn new(worker_script: WorkerScript, validator_script: ValidatorScript) -> Self {
        Self {
            worker_script,
            validator_script,
            inner: Arc::new(Mutex::new(LaunchInner { next_pid: 1000, ..Default::default() })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LaunchInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Worker children launched so far.
    pub fn worker_launches(&self) -> usize {
        self.lock().worker_pids.len()
    }

    /// Validator children launched so far.
    pub fn validator_launches(&self) -> usize {
        self.lock().validator_pids.len()
    }

    /// Pids handed to validator children.
    pub fn validator_pids(&self) -> Vec<u32> {
        self.lock().validator_pids.clone()
    }

    /// Pids that received a graceful terminate.
    pub fn terminations(&self) -> Vec<u32> {
        self.lock().terminations.clone()
    }

    /// Pids that were force-killed.
    pub fn kills(&self) -> Vec<u32> {
        self.lock().kills.clone()
    }

    /// Polls until at least `n` worker children were launched.
    pub async fn wait_for_worker_launches(&self, n: usize) {
        while self.worker_launches() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, role: LaunchRole) -> Result<Box<dyn ChildHandle>, PoolError> {
        let (pid, scripted_exit) = {
            let mut inner = self.lock();
            let pid = inner.next_pid;
            inner.next_pid += 1;
            let scripted = match &role {
                LaunchRole::Worker { .. } => {
                    let first = inner.worker_pids.is_empty();
                    inner.worker_pids.push(pid);
                    match self.worker_script {
                        WorkerScript::ExitImmediately(code) => Some(code),
                        WorkerScript::ExitFirstThenRun(code) if first => Some(code),
                        _ => None,
                    }
                }
                LaunchRole::Validator => {
                    inner.validator_pids.push(pid);
                    match self.validator_script {
                        ValidatorScript::Exit(code) => Some(code),
                        ValidatorScript::Hang => None,
                    }
                }
            };
            (pid, scripted)
        };

        Ok(Box::new(FakeChild {
            pid,
            scripted_exit,
            stopped: CancellationToken::new(),
            killed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            launcher: self.clone(),
        }))
    }
}

struct FakeChild {
    pid: u32,
    scripted_exit: Option<i32>,
    stopped: CancellationToken,
    killed: Arc<std::sync::atomic::AtomicBool>,
    launcher: FakeLauncher,
}

#[async_trait]
impl ChildHandle for FakeChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> std::io::Result<ChildExit> {
        if let Some(code) = self.scripted_exit.take() {
            return Ok(ChildExit { code: Some(code), signal: None });
        }
        self.stopped.cancelled().await;
        if self.killed.load(Ordering::SeqCst) {
            Ok(ChildExit { code: None, signal: Some(9) })
        } else {
            // a graceful terminate lets the dispatch loop exit zero
            Ok(ChildExit { code: Some(0), signal: None })
        }
    }

    fn terminate(&self) {
        self.launcher.lock().terminations.push(self.pid);
        self.stopped.cancel();
    }

    fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
        self.launcher.lock().kills.push(self.pid);
        self.stopped.cancel();
    }
}
