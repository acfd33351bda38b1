//! # Pool planner: turns resolved configuration into concrete worker slots.
//!
//! Pure computation, no side effects. [`plan`] walks the function registry
//! in declaration order and produces one [`WorkerPlanEntry`] per function;
//! [`worker_groups`] folds those entries into the process groups the
//! supervisor actually spawns.
//!
//! ## Count precedence
//! ```text
//! dedicated_only:
//!     resolved = dedicated_count          (error if unset or zero)
//! otherwise:
//!     min      = max(global count, 1), raised to max(function count, global count)
//!     ded      = global count + (function dedicated_count
//!                                | global dedicated_count
//!                                | -> ded = min)
//!     resolved = max(min, ded)
//! ```
//!
//! ## Grouping
//! ```text
//! shared group       all !dedicated_only functions, global-count workers,
//!                    each worker serves the whole set
//! dedicated groups   per function, (resolved - shared) single-function
//!                    workers; dedicated_only functions contribute their
//!                    full resolved count here
//! ```

use std::time::Duration;

use crate::config::ResolvedConfig;
use crate::error::ConfigError;

/// Highest scheduling priority accepted from configuration.
pub const MAX_PRIORITY: i32 = 5;
/// Lowest scheduling priority accepted from configuration.
pub const MIN_PRIORITY: i32 = -5;

/// One function's planned worker allocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPlanEntry {
    /// Bare function name.
    pub function: String,
    /// Handler identifier from configuration, if declared.
    pub handler: Option<String>,
    /// Total workers serving this function (shared + dedicated).
    pub count: u32,
    /// Served only from dedicated workers.
    pub dedicated_only: bool,
    /// Priority hint, clamped to `[MIN_PRIORITY, MAX_PRIORITY]`.
    pub priority: i32,
    /// Advisory broker-side job timeout.
    pub timeout: Option<Duration>,
}

/// What a worker group serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    /// The shared pool: every worker serves all non-dedicated functions.
    Shared,
    /// Single-function workers reserved for one function.
    Dedicated,
}

/// A set of identical worker processes to spawn and keep alive.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerGroup {
    /// Shared pool or per-function dedicated group.
    pub kind: GroupKind,
    /// Bare function names every worker in the group serves.
    pub functions: Vec<String>,
    /// Number of processes to keep running.
    pub count: u32,
}

impl WorkerGroup {
    /// Stable label for logs: `pool` for the shared group, the function
    /// name for dedicated groups.
    pub fn label(&self) -> &str {
        match self.kind {
            GroupKind::Shared => "pool",
            GroupKind::Dedicated => self.functions.first().map(String::as_str).unwrap_or("?"),
        }
    }
}

/// Computes the per-function worker allocation.
///
/// Entries come out in declaration order; the order carries no meaning but
/// keeps planning deterministic. Fails with [`ConfigError::DedicatedCount`]
/// when a `dedicated_only` function has no usable `dedicated_count`.
pub fn plan(cfg: &ResolvedConfig) -> Result<Vec<WorkerPlanEntry>, ConfigError> {
    let mut entries = Vec::with_capacity(cfg.functions.len());

    for (function, fc) in &cfg.functions {
        let count = if fc.dedicated_only {
            match fc.dedicated_count {
                Some(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::DedicatedCount {
                        function: function.clone(),
                    })
                }
            }
        } else {
            let mut min_count = cfg.count.max(1);
            if let Some(own) = fc.count.filter(|n| *n > 0) {
                min_count = own.max(cfg.count);
            }

            let ded_count = match fc.dedicated_count.or(cfg.dedicated_count) {
                Some(extra) if extra > 0 => cfg.count + extra,
                _ => min_count,
            };

            min_count.max(ded_count)
        };

        entries.push(WorkerPlanEntry {
            function: function.clone(),
            handler: fc.handler.clone(),
            count,
            dedicated_only: fc.dedicated_only,
            priority: fc.priority.unwrap_or(0).clamp(MIN_PRIORITY, MAX_PRIORITY),
            timeout: fc.timeout.filter(|t| *t > 0).map(Duration::from_secs),
        });
    }

    Ok(entries)
}

/// Folds plan entries into the worker groups the supervisor spawns.
///
/// The shared group exists only when at least one function is not
/// `dedicated_only`. Dedicated groups cover the remainder of each
/// function's resolved count above what the shared pool already provides.
pub fn worker_groups(entries: &[WorkerPlanEntry], cfg: &ResolvedConfig) -> Vec<WorkerGroup> {
    let mut groups = Vec::new();

    let shared: Vec<String> = entries
        .iter()
        .filter(|e| !e.dedicated_only)
        .map(|e| e.function.clone())
        .collect();
    if !shared.is_empty() {
        groups.push(WorkerGroup {
            kind: GroupKind::Shared,
            functions: shared,
            count: cfg.count,
        });
    }

    for entry in entries {
        let covered = if entry.dedicated_only { 0 } else { cfg.count };
        let dedicated = entry.count.saturating_sub(covered);
        if dedicated > 0 {
            groups.push(WorkerGroup {
                kind: GroupKind::Dedicated,
                functions: vec![entry.function.clone()],
                count: dedicated,
            });
        }
    }

    groups
}

/// Plan entries a worker process needs for its own function set, sorted by
/// descending priority (ties keep declaration order).
///
/// Workers register functions with the broker in this order, so the broker
/// sees higher-priority functions first.
pub fn registration_order<'a>(
    entries: &'a [WorkerPlanEntry],
    functions: &[String],
) -> Vec<&'a WorkerPlanEntry> {
    let mut selected: Vec<&WorkerPlanEntry> = entries
        .iter()
        .filter(|e| functions.iter().any(|f| f == &e.function))
        .collect();
    selected.sort_by_key(|e| std::cmp::Reverse(e.priority));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FunctionConfig, PoolSettings};
    use indexmap::IndexMap;

    fn config_with(
        count: u32,
        dedicated: Option<u32>,
        workers: Vec<(&str, FunctionConfig)>,
    ) -> ResolvedConfig {
        let mut map = IndexMap::new();
        for (name, fc) in workers {
            map.insert(name.to_string(), fc);
        }
        PoolSettings {
            count: Some(count),
            dedicated_count: dedicated,
            workers: Some(map),
            ..PoolSettings::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn test_dedicated_only_uses_dedicated_count() {
        let cfg = config_with(
            10,
            None,
            vec![(
                "solo",
                FunctionConfig {
                    dedicated_only: true,
                    dedicated_count: Some(3),
                    count: Some(1),
                    ..FunctionConfig::default()
                },
            )],
        );
        let entries = plan(&cfg).unwrap();
        assert_eq!(entries[0].count, 3);
        assert!(entries[0].dedicated_only);
    }

    #[test]
    fn test_dedicated_only_without_count_fails() {
        let cfg = config_with(
            10,
            None,
            vec![(
                "solo",
                FunctionConfig { dedicated_only: true, ..FunctionConfig::default() },
            )],
        );
        let err = plan(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::DedicatedCount { function } if function == "solo"));
    }

    #[test]
    fn test_documented_scenario_resolves_to_thirteen() {
        // count=1, dedicated_count=3, dedicated_only off, global count=10:
        // max(max(10, 1), 10 + 3) = 13
        let cfg = config_with(
            10,
            None,
            vec![(
                "do-stuff",
                FunctionConfig {
                    count: Some(1),
                    dedicated_count: Some(3),
                    ..FunctionConfig::default()
                },
            )],
        );
        assert_eq!(plan(&cfg).unwrap()[0].count, 13);
    }

    #[test]
    fn test_count_never_below_global_floor() {
        let cfg = config_with(
            4,
            None,
            vec![
                ("plain", FunctionConfig::default()),
                ("small", FunctionConfig { count: Some(1), ..FunctionConfig::default() }),
                ("big", FunctionConfig { count: Some(9), ..FunctionConfig::default() }),
            ],
        );
        let entries = plan(&cfg).unwrap();
        assert_eq!(entries[0].count, 4);
        assert_eq!(entries[1].count, 4); // explicit count never lowers the floor
        assert_eq!(entries[2].count, 9);
        for e in &entries {
            assert!(e.count >= 1);
        }
    }

    #[test]
    fn test_global_dedicated_count_applies_when_function_has_none() {
        let cfg = config_with(10, Some(2), vec![("plain", FunctionConfig::default())]);
        assert_eq!(plan(&cfg).unwrap()[0].count, 12);
    }

    #[test]
    fn test_priority_clamped_to_range() {
        let cfg = config_with(
            1,
            None,
            vec![
                ("hot", FunctionConfig { priority: Some(99), ..FunctionConfig::default() }),
                ("cold", FunctionConfig { priority: Some(-99), ..FunctionConfig::default() }),
                ("flat", FunctionConfig::default()),
            ],
        );
        let entries = plan(&cfg).unwrap();
        assert_eq!(entries[0].priority, MAX_PRIORITY);
        assert_eq!(entries[1].priority, MIN_PRIORITY);
        assert_eq!(entries[2].priority, 0);
    }

    #[test]
    fn test_entries_keep_declaration_order() {
        let cfg = config_with(
            1,
            None,
            vec![
                ("zulu", FunctionConfig::default()),
                ("alpha", FunctionConfig::default()),
                ("mike", FunctionConfig::default()),
            ],
        );
        let names: Vec<_> = plan(&cfg).unwrap().into_iter().map(|e| e.function).collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_groups_split_shared_and_dedicated() {
        let cfg = config_with(
            10,
            None,
            vec![
                (
                    "do-stuff",
                    FunctionConfig {
                        count: Some(1),
                        dedicated_count: Some(3),
                        ..FunctionConfig::default()
                    },
                ),
                (
                    "solo",
                    FunctionConfig {
                        dedicated_only: true,
                        dedicated_count: Some(2),
                        ..FunctionConfig::default()
                    },
                ),
                ("plain", FunctionConfig::default()),
            ],
        );
        let entries = plan(&cfg).unwrap();
        let groups = worker_groups(&entries, &cfg);

        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0].kind, GroupKind::Shared);
        assert_eq!(groups[0].functions, vec!["do-stuff", "plain"]);
        assert_eq!(groups[0].count, 10);
        assert_eq!(groups[0].label(), "pool");

        // do-stuff resolved to 13, 10 covered by the shared pool
        assert_eq!(groups[1].kind, GroupKind::Dedicated);
        assert_eq!(groups[1].functions, vec!["do-stuff"]);
        assert_eq!(groups[1].count, 3);

        // dedicated_only contributes its whole count
        assert_eq!(groups[2].functions, vec!["solo"]);
        assert_eq!(groups[2].count, 2);
        assert_eq!(groups[2].label(), "solo");
    }

    #[test]
    fn test_all_dedicated_only_means_no_shared_group() {
        let cfg = config_with(
            10,
            None,
            vec![(
                "solo",
                FunctionConfig {
                    dedicated_only: true,
                    dedicated_count: Some(1),
                    ..FunctionConfig::default()
                },
            )],
        );
        let entries = plan(&cfg).unwrap();
        let groups = worker_groups(&entries, &cfg);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, GroupKind::Dedicated);
    }

    #[test]
    fn test_registration_order_sorts_by_priority() {
        let cfg = config_with(
            1,
            None,
            vec![
                ("low", FunctionConfig { priority: Some(-2), ..FunctionConfig::default() }),
                ("high", FunctionConfig { priority: Some(4), ..FunctionConfig::default() }),
                ("mid", FunctionConfig::default()),
            ],
        );
        let entries = plan(&cfg).unwrap();
        let all: Vec<String> = entries.iter().map(|e| e.function.clone()).collect();
        let ordered: Vec<_> = registration_order(&entries, &all)
            .into_iter()
            .map(|e| e.function.as_str())
            .collect();
        assert_eq!(ordered, vec!["high", "mid", "low"]);
    }
}
