//! # Built-in log sink.
//!
//! [`LogWriter`] renders events as timestamped, leveled text lines:
//!
//! ```text
//! [2026-08-06 10:32:01.448] [8123] [proc] started worker 8144 (pool)
//! [2026-08-06 10:32:07.002] [8144] [work] (H:host:17) starting job: do-stuff
//! [2026-08-06 10:32:07.019] [8144] [work] (H:host:17) resized 3 images
//! ```
//!
//! The sink is stdout or an append-mode file, per configuration. Events
//! above the configured [`Verbosity`] are discarded before rendering.
//!
//! Every pool process (supervisor, validator, workers) builds its own
//! `LogWriter` over the same destination; lines interleave per write, which
//! is why each line carries the writing process's pid.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::config::{ResolvedConfig, Verbosity};
use crate::error::ConfigError;
use crate::events::{Event, EventKind};

use super::Subscribe;

/// Log sink subscriber: filters by verbosity, renders, writes.
pub struct LogWriter {
    verbosity: Verbosity,
    pid: u32,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl LogWriter {
    /// Sink writing to stdout.
    pub fn stdout(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            pid: std::process::id(),
            sink: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Sink appending to `path`, creating the file on demand.
    pub fn file(path: impl AsRef<Path>, verbosity: Verbosity) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ConfigError::LogFile { path: path.to_path_buf(), source })?;
        Ok(Self {
            verbosity,
            pid: std::process::id(),
            sink: Mutex::new(Box::new(file)),
        })
    }

    /// Sink described by the resolved configuration (`log_file`/`verbose`).
    pub fn from_config(cfg: &ResolvedConfig) -> Result<Self, ConfigError> {
        match &cfg.log_file {
            Some(path) => Self::file(path, cfg.verbose),
            None => Ok(Self::stdout(cfg.verbose)),
        }
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{line}");
            let _ = sink.flush();
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        if event.kind.level() > self.verbosity {
            return;
        }
        let ts: DateTime<Local> = event.at.into();
        let line = format!(
            "[{}] [{}] [{}] {}",
            ts.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.pid,
            level_tag(event.kind.level()),
            render_message(event),
        );
        self.write_line(&line);
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

/// Short tag printed for each verbosity level.
fn level_tag(level: Verbosity) -> &'static str {
    match level {
        Verbosity::Info => "info",
        Verbosity::ProcInfo => "proc",
        Verbosity::WorkerInfo => "work",
        Verbosity::Debug => "debug",
        Verbosity::Crazy => "crazy",
    }
}

/// Renders the human-readable message for an event.
///
/// Pure; the surrounding timestamp/pid/level envelope is added by the
/// writer.
pub(crate) fn render_message(ev: &Event) -> String {
    let group = ev.group.as_deref().unwrap_or("?");
    let function = ev.function.as_deref().unwrap_or("?");
    let handle = ev.handle.as_deref().unwrap_or("?");
    let line = ev.line.as_deref().unwrap_or("");
    let reason = ev.reason.as_deref().unwrap_or("unknown");

    match ev.kind {
        EventKind::ManagerStarted => {
            format!("started with pid {}", ev.pid.unwrap_or_default())
        }
        EventKind::StartupAborted => format!("startup aborted: {reason}"),
        EventKind::ValidationFailed => format!("function {function} not found"),
        EventKind::WorkerSpawned => {
            format!("started worker {} ({group})", ev.pid.unwrap_or_default())
        }
        EventKind::WorkerExited => {
            let pid = ev.pid.unwrap_or_default();
            match (ev.status, ev.reason.as_deref()) {
                (Some(code), _) => format!("worker {pid} ({group}) exited with status {code}"),
                (None, Some(r)) => format!("worker {pid} ({group}) exited: {r}"),
                (None, None) => format!("worker {pid} ({group}) exited"),
            }
        }
        EventKind::RespawnScheduled => format!(
            "respawning {group} worker in {}ms",
            ev.delay_ms.unwrap_or_default()
        ),
        EventKind::SpawnFailed => format!(
            "unable to start {group} worker ({reason}); retrying in {}ms",
            ev.delay_ms.unwrap_or_default()
        ),
        EventKind::ShutdownRequested => "shutdown requested, stopping workers".to_string(),
        EventKind::AllStoppedWithin => "all workers stopped".to_string(),
        EventKind::GraceExceeded => format!("shutdown grace exceeded; stuck: {reason}"),
        EventKind::ServerAdded => {
            format!("adding server {}", ev.server.as_deref().unwrap_or("?"))
        }
        EventKind::FunctionRegistered => match ev.timeout_ms {
            Some(ms) => format!("adding job {function}; timeout: {ms}ms"),
            None => format!("adding job {function}"),
        },
        EventKind::JobStarted => format!("({handle}) starting job: {function}"),
        EventKind::JobWorkload => format!("({handle}) workload: {line}"),
        EventKind::JobLogLine => format!("({handle}) {line}"),
        EventKind::JobResultLine => format!("({handle}) {line}"),
        EventKind::JobSkipped => format!("({handle}) skipping job {function}: {reason}"),
        EventKind::BrokerBackoff => format!(
            "broker unavailable ({reason}), sleeping {}ms",
            ev.delay_ms.unwrap_or_default()
        ),
        EventKind::BrokerFault => format!("broker error: {reason}"),
        EventKind::LifetimeReached => "been running too long, exiting".to_string(),
        EventKind::RunLimitReached => format!(
            "ran {} jobs which is over the maximum ({}), exiting",
            ev.runs.unwrap_or_default(),
            ev.limit.unwrap_or_default()
        ),
        EventKind::SubscriberOverflow => format!("subscriber dropped event: {reason}"),
        EventKind::SubscriberPanicked => format!("subscriber panicked: {reason}"),
    }
}
