//! # Live process table.
//!
//! The supervisor's authoritative record of running worker processes:
//! pid → [`WorkerProcess`]. Entries are inserted when a fork returns in
//! the parent and removed when the OS process is reaped; nothing else in
//! the system reads or writes another worker's state.
//!
//! The table is shared between the supervisor and its slot actors (all in
//! the parent process); worker processes never see it.

use std::collections::HashMap;
use std::time::SystemTime;

use tokio::sync::RwLock;

/// One running child, as the supervisor sees it.
///
/// The jobs-executed counter lives in the worker process itself (explicit
/// dispatcher state); the parent only tracks identity, assignment and age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProcess {
    /// OS process id.
    pub pid: u32,
    /// Group label (`pool` or the dedicated function name).
    pub group: String,
    /// Bare function names the worker serves.
    pub functions: Vec<String>,
    /// When the fork returned in the parent.
    pub started_at: SystemTime,
}

/// Pid-keyed table of live workers.
#[derive(Debug, Default)]
pub struct ProcessTable {
    state: RwLock<HashMap<u32, WorkerProcess>>,
}

impl ProcessTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly spawned worker.
    pub async fn insert(&self, worker: WorkerProcess) {
        self.state.write().await.insert(worker.pid, worker);
    }

    /// Removes a reaped worker. Unknown pids are a no-op.
    pub async fn remove(&self, pid: u32) {
        self.state.write().await.remove(&pid);
    }

    /// Number of live workers.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    /// True when no worker is alive.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// Snapshot of all live workers, ordered by pid.
    pub async fn snapshot(&self) -> Vec<WorkerProcess> {
        let state = self.state.read().await;
        let mut workers: Vec<WorkerProcess> = state.values().cloned().collect();
        workers.sort_by_key(|w| w.pid);
        workers
    }

    /// Sorted, deduplicated labels of groups that still have live workers.
    ///
    /// Used for the stuck-worker diagnostic when shutdown overruns its
    /// grace window.
    pub async fn live_groups(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut groups: Vec<String> = state.values().map(|w| w.group.clone()).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(pid: u32, group: &str) -> WorkerProcess {
        WorkerProcess {
            pid,
            group: group.to_string(),
            functions: vec!["do-stuff".to_string()],
            started_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_reap() {
        let table = ProcessTable::new();
        assert!(table.is_empty().await);

        table.insert(worker(10, "pool")).await;
        table.insert(worker(11, "pool")).await;
        assert_eq!(table.len().await, 2);

        table.remove(10).await;
        table.remove(999).await; // unknown pid is fine
        let rest = table.snapshot().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].pid, 11);
    }

    #[tokio::test]
    async fn test_live_groups_dedup_and_sort() {
        let table = ProcessTable::new();
        table.insert(worker(3, "pool")).await;
        table.insert(worker(1, "do-stuff")).await;
        table.insert(worker(2, "pool")).await;
        assert_eq!(table.live_groups().await, vec!["do-stuff", "pool"]);
    }
}
