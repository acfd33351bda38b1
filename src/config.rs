//! # Pool configuration: sources, merging, and the resolved plan input.
//!
//! Two layers live here:
//!
//! - [`PoolSettings`] — a raw, mergeable configuration source. Typically one
//!   instance comes from a TOML file and a second from whatever front end
//!   embeds the pool (command-line flags, an application config service).
//!   Sources merge with [`PoolSettings::merged_with`]: the override source
//!   wins key-by-key at the top level, and the `workers` registries are
//!   deep-merged entry-by-entry.
//! - [`ResolvedConfig`] — the immutable result of [`PoolSettings::resolve`].
//!   Everything downstream (planner, supervisor, dispatcher) reads only this
//!   struct. It serializes, because the supervisor hands it to worker and
//!   validator processes through the environment.
//!
//! ## Sentinel values
//! In raw settings, `0` means "disabled/unlimited" for `max_worker_lifetime`,
//! `max_runs_per_worker` and `worker_restart_splay`. Resolution converts
//! those to `None`/`Duration::ZERO` so the rest of the crate never checks
//! sentinels.
//!
//! ## Example
//! ```rust
//! use gearvisor::PoolSettings;
//!
//! let base: PoolSettings = toml::from_str(r#"
//!     host = ["127.0.0.1:4730"]
//!     count = 10
//!     max_runs_per_worker = 20
//!
//!     [workers.do-stuff]
//!     handler = "app.workers.DoStuff"
//!     dedicated_count = 3
//! "#).unwrap();
//!
//! let overrides = PoolSettings { count: Some(4), ..PoolSettings::default() };
//! let cfg = base.merged_with(overrides).resolve().unwrap();
//! assert_eq!(cfg.count, 4);
//! assert!(cfg.functions.contains_key("do-stuff"));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default job-server address when no `host` is configured.
pub const DEFAULT_SERVER: &str = "127.0.0.1:4730";

const DEFAULT_COUNT: u32 = 1;
const DEFAULT_LIFETIME_SECS: u64 = 3600;
const DEFAULT_SPLAY_SECS: u64 = 600;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;
const DEFAULT_GRACE_SECS: u64 = 30;

/// Log verbosity ladder, lowest to highest.
///
/// An event is written when its level is at or below the configured
/// verbosity; `Info` events are always written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Always-on messages: fatal aborts, skipped jobs, validation failures.
    #[default]
    Info,
    /// Process lifecycle: spawns, exits, respawn scheduling, shutdown.
    ProcInfo,
    /// Per-job flow: registration, job start, handler log lines.
    WorkerInfo,
    /// Payloads and results.
    Debug,
    /// Everything, including events with no renderer of their own.
    Crazy,
}

/// Per-function entry of the worker registry.
///
/// All fields are optional in source form; planning applies the precedence
/// rules (see [`plan`](crate::plan::plan)).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    /// Handler identifier resolved through the handler registry. A function
    /// without one never validates.
    pub handler: Option<String>,
    /// Explicit worker count for this function.
    pub count: Option<u32>,
    /// Workers reserved exclusively for this function.
    pub dedicated_count: Option<u32>,
    /// Serve this function only from dedicated workers, never the shared
    /// pool. Requires `dedicated_count >= 1`.
    pub dedicated_only: bool,
    /// Scheduling priority hint, clamped to the supported range at planning.
    pub priority: Option<i32>,
    /// Seconds the broker should wait before reassigning a job of this
    /// function to another worker. Advisory; not enforced by the dispatcher.
    pub timeout: Option<u64>,
}

/// One raw configuration source.
///
/// Field names follow the configuration surface: `host`, `count`,
/// `dedicated_count`, `max_worker_lifetime`, `max_runs_per_worker`,
/// `worker_restart_splay`, and the `[workers.<function>]` registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Job-server addresses (`host:port`), tried in order.
    pub host: Option<Vec<String>>,
    /// Global default worker count (the shared pool size).
    pub count: Option<u32>,
    /// Global dedicated-worker count added on top of the shared pool for
    /// every function that does not set its own.
    pub dedicated_count: Option<u32>,
    /// Seconds a worker may live before recycling itself. `0` = forever.
    pub max_worker_lifetime: Option<u64>,
    /// Jobs a worker may execute before recycling itself. `0` = unlimited.
    pub max_runs_per_worker: Option<u32>,
    /// Upper bound, in seconds, of the random respawn delay. `0` = respawn
    /// immediately.
    pub worker_restart_splay: Option<u64>,
    /// Milliseconds a worker blocks in one broker fetch before re-checking
    /// its own limits.
    pub fetch_timeout_ms: Option<u64>,
    /// Seconds to wait for workers to exit on graceful shutdown before
    /// escalating to SIGKILL.
    pub grace: Option<u64>,
    /// Prefix prepended to every function name registered with the broker.
    pub prefix: Option<String>,
    /// Process owner the embedding binary should drop to. Recorded and
    /// printed by the config dump; applying it is the embedder's concern.
    pub user: Option<String>,
    /// Where to write the supervisor's pid, as plain text, once at startup.
    pub pid_file: Option<PathBuf>,
    /// Append-mode log file. Unset = stdout.
    pub log_file: Option<PathBuf>,
    /// Minimum event level written to the log.
    pub verbose: Option<Verbosity>,
    /// Debug mode: print the resolved configuration and exit without
    /// starting anything.
    pub dump_config: bool,
    /// The function registry.
    pub workers: Option<IndexMap<String, FunctionConfig>>,
}

impl PoolSettings {
    /// Loads one source from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Unparsable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Merges `overrides` over `self`.
    ///
    /// Top-level keys replace wholesale (an override `host` list discards
    /// the base list). The `workers` registries are deep-merged: override
    /// entries replace same-named base entries, everything else is kept.
    pub fn merged_with(mut self, overrides: PoolSettings) -> PoolSettings {
        self.host = overrides.host.or(self.host);
        self.count = overrides.count.or(self.count);
        self.dedicated_count = overrides.dedicated_count.or(self.dedicated_count);
        self.max_worker_lifetime = overrides.max_worker_lifetime.or(self.max_worker_lifetime);
        self.max_runs_per_worker = overrides.max_runs_per_worker.or(self.max_runs_per_worker);
        self.worker_restart_splay = overrides.worker_restart_splay.or(self.worker_restart_splay);
        self.fetch_timeout_ms = overrides.fetch_timeout_ms.or(self.fetch_timeout_ms);
        self.grace = overrides.grace.or(self.grace);
        self.prefix = overrides.prefix.or(self.prefix);
        self.user = overrides.user.or(self.user);
        self.pid_file = overrides.pid_file.or(self.pid_file);
        self.log_file = overrides.log_file.or(self.log_file);
        self.verbose = overrides.verbose.or(self.verbose);
        self.dump_config = self.dump_config || overrides.dump_config;

        self.workers = match (self.workers, overrides.workers) {
            (Some(mut base), Some(over)) => {
                base.extend(over);
                Some(base)
            }
            (base, over) => over.or(base),
        };
        self
    }

    /// Resolves this source into the immutable configuration consumed by
    /// the rest of the crate.
    ///
    /// Fails with [`ConfigError::MissingWorkers`] when no source defined a
    /// non-empty `workers` registry.
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let functions = match self.workers {
            Some(map) if !map.is_empty() => map,
            _ => return Err(ConfigError::MissingWorkers),
        };

        let lifetime = self.max_worker_lifetime.unwrap_or(DEFAULT_LIFETIME_SECS);
        let max_runs = self.max_runs_per_worker.unwrap_or(0);

        Ok(ResolvedConfig {
            servers: self
                .host
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| vec![DEFAULT_SERVER.to_string()]),
            count: self.count.unwrap_or(DEFAULT_COUNT).max(1),
            dedicated_count: self.dedicated_count.filter(|n| *n > 0),
            max_worker_lifetime: (lifetime > 0).then(|| Duration::from_secs(lifetime)),
            max_runs_per_worker: (max_runs > 0).then_some(max_runs),
            restart_splay: Duration::from_secs(
                self.worker_restart_splay.unwrap_or(DEFAULT_SPLAY_SECS),
            ),
            fetch_timeout: Duration::from_millis(
                self.fetch_timeout_ms.unwrap_or(DEFAULT_FETCH_TIMEOUT_MS).max(1),
            ),
            grace: Duration::from_secs(self.grace.unwrap_or(DEFAULT_GRACE_SECS)),
            prefix: self.prefix.filter(|p| !p.is_empty()),
            user: self.user,
            pid_file: self.pid_file,
            log_file: self.log_file,
            verbose: self.verbose.unwrap_or_default(),
            dump_config: self.dump_config,
            functions,
        })
    }
}

/// Immutable, fully resolved pool configuration.
///
/// Produced once by [`PoolSettings::resolve`] and read-only afterwards.
/// Worker processes receive a byte-identical copy through the environment,
/// so no cross-process locking is ever needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Job-server addresses, in connection order.
    pub servers: Vec<String>,
    /// Shared-pool worker count (always `>= 1`).
    pub count: u32,
    /// Global dedicated-worker count, if any.
    pub dedicated_count: Option<u32>,
    /// Per-worker lifetime budget. `None` = unlimited.
    pub max_worker_lifetime: Option<Duration>,
    /// Per-worker run-count budget. `None` = unlimited.
    pub max_runs_per_worker: Option<u32>,
    /// Upper bound of the random respawn delay.
    pub restart_splay: Duration,
    /// Blocking timeout of one broker fetch call.
    pub fetch_timeout: Duration,
    /// Graceful-shutdown window before SIGKILL escalation.
    pub grace: Duration,
    /// Broker-visible function-name prefix.
    pub prefix: Option<String>,
    /// Process owner identity for the embedder.
    pub user: Option<String>,
    /// Pid-file path, written once at supervisor startup.
    pub pid_file: Option<PathBuf>,
    /// Log-file path. Unset = stdout.
    pub log_file: Option<PathBuf>,
    /// Minimum event level written to the log.
    pub verbose: Verbosity,
    /// Print the resolved configuration and exit.
    #[serde(default)]
    pub dump_config: bool,
    /// Function registry, in declaration order.
    pub functions: IndexMap<String, FunctionConfig>,
}

impl ResolvedConfig {
    /// Broker-visible name of `function`: the configured prefix, if any,
    /// prepended to the bare name.
    pub fn broker_name(&self, function: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{p}{function}"),
            None => function.to_string(),
        }
    }

    /// Inverse of [`broker_name`](Self::broker_name): strips the configured
    /// prefix from an incoming job's function name. Names without the
    /// prefix pass through unchanged.
    pub fn bare_name<'a>(&self, broker_name: &'a str) -> &'a str {
        match &self.prefix {
            Some(p) => broker_name.strip_prefix(p.as_str()).unwrap_or(broker_name),
            None => broker_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_worker() -> IndexMap<String, FunctionConfig> {
        let mut map = IndexMap::new();
        map.insert(
            "do-stuff".to_string(),
            FunctionConfig {
                handler: Some("app.workers.DoStuff".to_string()),
                ..FunctionConfig::default()
            },
        );
        map
    }

    #[test]
    fn test_resolve_fails_without_workers() {
        let err = PoolSettings::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingWorkers));

        let settings = PoolSettings {
            workers: Some(IndexMap::new()),
            ..PoolSettings::default()
        };
        assert!(matches!(settings.resolve(), Err(ConfigError::MissingWorkers)));
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let cfg = PoolSettings {
            workers: Some(one_worker()),
            ..PoolSettings::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(cfg.servers, vec![DEFAULT_SERVER.to_string()]);
        assert_eq!(cfg.count, 1);
        assert_eq!(cfg.max_worker_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.max_runs_per_worker, None);
        assert_eq!(cfg.restart_splay, Duration::from_secs(600));
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.verbose, Verbosity::Info);
    }

    #[test]
    fn test_zero_sentinels_mean_unlimited() {
        let cfg = PoolSettings {
            max_worker_lifetime: Some(0),
            max_runs_per_worker: Some(0),
            worker_restart_splay: Some(0),
            workers: Some(one_worker()),
            ..PoolSettings::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(cfg.max_worker_lifetime, None);
        assert_eq!(cfg.max_runs_per_worker, None);
        assert_eq!(cfg.restart_splay, Duration::ZERO);
    }

    #[test]
    fn test_merge_override_wins_key_by_key() {
        let base = PoolSettings {
            count: Some(10),
            prefix: Some("base.".to_string()),
            host: Some(vec!["a:4730".to_string(), "b:4730".to_string()]),
            workers: Some(one_worker()),
            ..PoolSettings::default()
        };
        let overrides = PoolSettings {
            count: Some(2),
            host: Some(vec!["c:4730".to_string()]),
            ..PoolSettings::default()
        };

        let merged = base.merged_with(overrides);
        assert_eq!(merged.count, Some(2));
        // untouched keys survive
        assert_eq!(merged.prefix.as_deref(), Some("base."));
        // top-level lists replace, they do not concatenate
        assert_eq!(merged.host, Some(vec!["c:4730".to_string()]));
    }

    #[test]
    fn test_merge_deep_merges_worker_registries() {
        let mut base_workers = one_worker();
        base_workers.insert(
            "keep-me".to_string(),
            FunctionConfig { count: Some(2), ..FunctionConfig::default() },
        );
        let base = PoolSettings {
            workers: Some(base_workers),
            ..PoolSettings::default()
        };

        let mut override_workers = IndexMap::new();
        override_workers.insert(
            "do-stuff".to_string(),
            FunctionConfig { count: Some(7), ..FunctionConfig::default() },
        );
        let overrides = PoolSettings {
            workers: Some(override_workers),
            ..PoolSettings::default()
        };

        let merged = base.merged_with(overrides);
        let workers = merged.workers.unwrap();
        assert_eq!(workers.len(), 2);
        // same-named entry replaced wholesale
        assert_eq!(workers["do-stuff"].count, Some(7));
        assert_eq!(workers["do-stuff"].handler, None);
        // unrelated entry untouched
        assert_eq!(workers["keep-me"].count, Some(2));
    }

    #[test]
    fn test_parses_realistic_toml() {
        let settings: PoolSettings = toml::from_str(
            r#"
            host = ["127.0.0.1:4730", "127.0.0.1:4731"]
            count = 10
            dedicated_count = 1
            max_worker_lifetime = 3600
            max_runs_per_worker = 20
            worker_restart_splay = 300
            log_file = "data/logs/pool.log"
            verbose = "worker_info"

            [workers.do-stuff]
            handler = "app.workers.DoStuff"
            dedicated_count = 3
            dedicated_only = true
            count = 1
            timeout = 30
            "#,
        )
        .unwrap();

        let cfg = settings.resolve().unwrap();
        assert_eq!(cfg.servers.len(), 2);
        assert_eq!(cfg.count, 10);
        assert_eq!(cfg.verbose, Verbosity::WorkerInfo);
        let f = &cfg.functions["do-stuff"];
        assert!(f.dedicated_only);
        assert_eq!(f.dedicated_count, Some(3));
        assert_eq!(f.timeout, Some(30));
    }

    #[test]
    fn test_prefix_round_trip() {
        let mut cfg = PoolSettings {
            workers: Some(one_worker()),
            ..PoolSettings::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(cfg.broker_name("do-stuff"), "do-stuff");

        cfg.prefix = Some("acme.".to_string());
        assert_eq!(cfg.broker_name("do-stuff"), "acme.do-stuff");
        assert_eq!(cfg.bare_name("acme.do-stuff"), "do-stuff");
        // unprefixed names pass through
        assert_eq!(cfg.bare_name("do-stuff"), "do-stuff");
    }
}
