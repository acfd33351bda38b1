//! Error types used by the gearvisor supervisor and worker processes.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`ConfigError`] — configuration cannot be resolved into a runnable pool.
//! - [`PoolError`] — the supervisor process cannot start or finish cleanly.
//! - [`DispatchError`] — a single job cannot be dispatched to a handler.
//! - [`BrokerError`] — transport-level failures reported by the broker
//!   collaborator.
//!
//! Propagation policy: `ConfigError` and `PoolError` are fatal and surface
//! from [`Pool::run`](crate::Pool::run) before any steady-state worker does
//! real work. `DispatchError` is absorbed entirely inside the dispatch loop
//! (the offending job is logged and skipped). `BrokerError` is retried with
//! backoff and never terminates a worker on its own.
//!
//! All types provide `as_label()` for stable snake_case identifiers in logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while resolving configuration into a worker plan.
///
/// Every variant is fatal: the pool refuses to start and no process is
/// spawned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the base nor the override source defined a `workers` section.
    #[error("no worker functions configured; add a [workers] section")]
    MissingWorkers,

    /// A configuration file was declared but could not be read.
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        /// Path that was declared in the configuration surface.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file was read but did not parse as TOML.
    #[error("cannot parse config file {path}: {reason}")]
    Unparsable {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// `dedicated_only` was set for a function without a usable
    /// `dedicated_count`.
    #[error("function {function}: dedicated_only requires dedicated_count >= 1")]
    DedicatedCount {
        /// Function whose entry is invalid.
        function: String,
    },

    /// The pid file could not be written at startup.
    #[error("unable to write pid file {path}: {source}")]
    PidFile {
        /// Configured pid-file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configured log file could not be opened for append.
    #[error("unable to open log file {path}: {source}")]
    LogFile {
        /// Configured log-file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The role handoff from the supervisor to a child process was corrupt.
    ///
    /// Worker and validator processes receive their assignment through the
    /// environment; this fires when those variables are missing or do not
    /// deserialize.
    #[error("invalid worker-role handoff: {reason}")]
    Handoff {
        /// What was wrong with the handoff payload.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::MissingWorkers => "config_missing_workers",
            ConfigError::Unreadable { .. } => "config_unreadable",
            ConfigError::Unparsable { .. } => "config_unparsable",
            ConfigError::DedicatedCount { .. } => "config_dedicated_count",
            ConfigError::PidFile { .. } => "config_pid_file",
            ConfigError::LogFile { .. } => "config_log_file",
            ConfigError::Handoff { .. } => "config_handoff",
        }
    }
}

/// Errors raised by the supervisor process itself.
///
/// These abort the whole pool: either startup never completes (validation,
/// empty plan) or shutdown did not converge within the grace window.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// Configuration could not be resolved or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker process could not reach steady state (connect or
    /// registration against the broker failed).
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The function registry was empty after planning.
    #[error("no workers found")]
    NoWorkers,

    /// The pre-flight validator reported an unresolvable function.
    ///
    /// The failing function name is in the log stream; the validator child
    /// exits non-zero as the failure channel.
    #[error("worker validation failed (exit status {status}); see log for the offending function")]
    ValidationFailed {
        /// Exit status of the validator child.
        status: i32,
    },

    /// A child process could not be spawned.
    #[error("unable to spawn worker process: {reason}")]
    Spawn {
        /// Spawn diagnostic (exec path, OS error).
        reason: String,
    },

    /// Shutdown grace period was exceeded; some workers had to be killed.
    #[error("shutdown grace {grace:?} exceeded; stuck workers: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Function sets of workers that did not exit in time.
        stuck: Vec<String>,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Config(_) => "pool_config",
            PoolError::Broker(_) => "pool_broker",
            PoolError::NoWorkers => "pool_no_workers",
            PoolError::ValidationFailed { .. } => "pool_validation_failed",
            PoolError::Spawn { .. } => "pool_spawn",
            PoolError::GraceExceeded { .. } => "pool_grace_exceeded",
        }
    }
}

/// Per-job dispatch failures.
///
/// Local to one job: the dispatcher logs the failure and skips the job
/// without executing it. Broker-level re-delivery, if any, is external.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The job's function name does not resolve to any registered handler.
    #[error("function {function} not found")]
    HandlerNotFound {
        /// Bare (unprefixed) function name from the job.
        function: String,
    },

    /// The function resolved, but the registry could not produce an object
    /// with the required handler capability.
    #[error("handler for {function} could not be instantiated: {reason}")]
    Instantiate {
        /// Function whose handler is unusable.
        function: String,
        /// Registry diagnostic.
        reason: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::HandlerNotFound { .. } => "dispatch_handler_not_found",
            DispatchError::Instantiate { .. } => "dispatch_instantiate",
        }
    }
}

/// Transport-level failures reported by the broker collaborator.
///
/// Never fatal to a worker: `NotConnected` triggers a multi-second backoff
/// before re-polling, `Io` is logged and the loop continues.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BrokerError {
    /// No active connections to any configured job server.
    #[error("no active connections to job servers")]
    NotConnected,

    /// Any other transport failure.
    #[error("broker i/o error: {reason}")]
    Io {
        /// Transport diagnostic.
        reason: String,
    },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::NotConnected => "broker_not_connected",
            BrokerError::Io { .. } => "broker_io",
        }
    }

    /// Whether the dispatcher should back off for several seconds before
    /// the next poll, rather than re-polling immediately.
    pub fn wants_backoff(&self) -> bool {
        matches!(self, BrokerError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(ConfigError::MissingWorkers.as_label(), "config_missing_workers");
        assert_eq!(PoolError::NoWorkers.as_label(), "pool_no_workers");
        assert_eq!(
            DispatchError::HandlerNotFound { function: "x".into() }.as_label(),
            "dispatch_handler_not_found"
        );
        assert_eq!(BrokerError::NotConnected.as_label(), "broker_not_connected");
    }

    #[test]
    fn test_only_disconnects_want_backoff() {
        assert!(BrokerError::NotConnected.wants_backoff());
        assert!(!BrokerError::Io { reason: "reset".into() }.wants_backoff());
    }

    #[test]
    fn test_config_error_converts_into_pool_error() {
        let err: PoolError = ConfigError::MissingWorkers.into();
        assert_eq!(err.as_label(), "pool_config");
    }
}
