//! # Pre-flight handler validation.
//!
//! Before committing to a fleet of worker processes, the supervisor runs
//! one short-lived child in the validator role. The child resolves every
//! planned function through the handler registry and exits:
//!
//! - **status 0** — every function resolved; it signals nothing else;
//! - **non-zero** — the first unresolved function was logged and the
//!   child aborted.
//!
//! The supervisor waits a bounded window for that verdict. A failure
//! within the window aborts startup with zero workers ever spawned; the
//! absence of a failure is success. A validator that somehow outlives the
//! window keeps running unwatched and is force-killed when the supervisor
//! exits.
//!
//! Failing fast here beats spawning a fleet of workers that would all hit
//! the same unresolvable function on their first job.

use std::time::Duration;

use crate::error::PoolError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRegistry;
use crate::plan::WorkerPlanEntry;

use super::launcher::{ChildHandle, LaunchRole, Launcher};

/// How long the supervisor waits for the validator's verdict.
pub const VALIDATION_WAIT: Duration = Duration::from_secs(5);

/// The check itself, run inside the validator child.
///
/// Stops at the first unresolved function: publishes the failure and
/// returns the error that makes the child exit non-zero.
pub fn validate_functions(
    entries: &[WorkerPlanEntry],
    registry: &dyn HandlerRegistry,
    bus: &Bus,
) -> Result<(), PoolError> {
    for entry in entries {
        if registry.resolve(&entry.function).is_none() {
            bus.publish(
                Event::new(EventKind::ValidationFailed).with_function(entry.function.as_str()),
            );
            return Err(PoolError::ValidationFailed { status: 1 });
        }
    }
    Ok(())
}

/// Supervisor-side pre-flight: launch the validator child and wait out
/// `wait` for its verdict.
///
/// Returns `None` when the child exited zero, `Some(handle)` when the
/// window elapsed without a verdict (the caller owns killing the straggler
/// at shutdown), and an error when the child reported failure.
pub(crate) async fn preflight(
    launcher: &dyn Launcher,
    wait: Duration,
) -> Result<Option<Box<dyn ChildHandle>>, PoolError> {
    let mut child = launcher.launch(LaunchRole::Validator).await?;

    match tokio::time::timeout(wait, child.wait()).await {
        Ok(Ok(exit)) if exit.success() => Ok(None),
        Ok(Ok(exit)) => Err(PoolError::ValidationFailed { status: exit.code.unwrap_or(-1) }),
        Ok(Err(e)) => Err(PoolError::Spawn { reason: format!("validator wait failed: {e}") }),
        Err(_elapsed) => Ok(Some(child)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FunctionConfig, PoolSettings};
    use crate::handlers::MapRegistry;
    use crate::plan;
    use crate::testing::{FakeLauncher, ValidatorScript, WorkerScript};
    use indexmap::IndexMap;

    fn entries(names: &[&str]) -> Vec<WorkerPlanEntry> {
        let mut map = IndexMap::new();
        for name in names {
            map.insert(
                name.to_string(),
                FunctionConfig { handler: Some(format!("h.{name}")), ..Default::default() },
            );
        }
        let cfg = PoolSettings { workers: Some(map), ..Default::default() }.resolve().unwrap();
        plan::plan(&cfg).unwrap()
    }

    #[tokio::test]
    async fn test_all_functions_resolving_passes() {
        let entries = entries(&["a", "b"]);
        let mut registry = MapRegistry::new();
        registry.bind("a", "h.a");
        registry.bind("b", "h.b");

        let bus = Bus::new(16);
        assert!(validate_functions(&entries, &registry, &bus).is_ok());
    }

    #[tokio::test]
    async fn test_first_unresolved_function_aborts() {
        let entries = entries(&["a", "missing-job", "b"]);
        let mut registry = MapRegistry::new();
        registry.bind("a", "h.a");
        registry.bind("b", "h.b");

        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let err = validate_functions(&entries, &registry, &bus).unwrap_err();
        assert!(matches!(err, PoolError::ValidationFailed { status: 1 }));

        let ev = events.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::ValidationFailed);
        assert_eq!(ev.function.as_deref(), Some("missing-job"));
    }

    #[tokio::test]
    async fn test_preflight_accepts_clean_exit() {
        let launcher =
            FakeLauncher::new(WorkerScript::RunUntilStopped, ValidatorScript::Exit(0));
        let helper = preflight(&launcher, Duration::from_secs(1)).await.unwrap();
        assert!(helper.is_none());
    }

    #[tokio::test]
    async fn test_preflight_propagates_failure_status() {
        let launcher =
            FakeLauncher::new(WorkerScript::RunUntilStopped, ValidatorScript::Exit(1));
        let err = preflight(&launcher, Duration::from_secs(1)).await.err().unwrap();
        assert!(matches!(err, PoolError::ValidationFailed { status: 1 }));
    }

    #[tokio::test]
    async fn test_preflight_hands_back_a_straggler() {
        let launcher = FakeLauncher::new(WorkerScript::RunUntilStopped, ValidatorScript::Hang);
        let helper = preflight(&launcher, Duration::from_millis(20)).await.unwrap();
        assert!(helper.is_some());
    }
}
