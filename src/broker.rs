//! # Broker collaborator: the job-queue transport seam.
//!
//! The pool never speaks a wire protocol itself. Workers drive an
//! implementation of [`Broker`] — connect, register the functions they
//! serve, block on [`Broker::fetch_job`] up to a bounded timeout, and
//! report results with [`Broker::complete_job`].
//!
//! ## Fetch outcomes
//! ```text
//! fetch_job(timeout)
//!   ├─ Ok(Fetch::Job(job))   dispatch it
//!   ├─ Ok(Fetch::NoJob)      nothing queued; re-poll
//!   ├─ Ok(Fetch::IoWait)     transport made no progress; re-poll
//!   ├─ Err(NotConnected)     no active connections; back off seconds
//!   └─ Err(Io{..})           logged; re-poll
//! ```
//! `NoJob` and `IoWait` are ordinary idle outcomes, not errors. The fetch
//! timeout is what lets an idle worker re-check its own lifetime and
//! run-count budgets.
//!
//! ## Factories
//! Each worker process opens its own connection, so the pool takes a
//! [`BrokerFactory`] rather than a ready broker. Any
//! `Fn() -> Box<dyn Broker>` closure qualifies.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrokerError;

/// One job received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Broker-assigned job handle, unique per submission.
    pub handle: String,
    /// Function name as the broker knows it (possibly prefixed).
    pub function: String,
    /// Opaque workload payload.
    pub workload: Vec<u8>,
}

impl Job {
    /// Workload as text, with invalid UTF-8 replaced.
    pub fn workload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.workload)
    }
}

/// Outcome of one fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// A job was assigned to this worker.
    Job(Job),
    /// The queue had nothing for this worker's functions.
    NoJob,
    /// The transport is waiting on I/O; nothing was assigned.
    IoWait,
}

/// The job-queue transport a worker process drives.
///
/// Implementations own their connection state; the dispatcher calls these
/// methods from a single task, in order: `connect`, `register_function`
/// per served function, then the fetch/complete loop, and finally
/// `unregister_all` on the way out.
#[async_trait]
pub trait Broker: Send {
    /// Establishes connections to the given `host:port` addresses.
    async fn connect(&mut self, servers: &[String]) -> Result<(), BrokerError>;

    /// Announces that this worker serves `name`.
    ///
    /// `timeout` is advisory: how long the broker should wait before
    /// reassigning a job of this function to another worker.
    async fn register_function(
        &mut self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BrokerError>;

    /// Blocks up to `timeout` for the next job assignment.
    async fn fetch_job(&mut self, timeout: Duration) -> Result<Fetch, BrokerError>;

    /// Reports `result` as the completion of `job`.
    async fn complete_job(&mut self, job: &Job, result: &Value) -> Result<(), BrokerError>;

    /// Withdraws every registration before the worker exits.
    async fn unregister_all(&mut self) -> Result<(), BrokerError>;
}

/// Produces one broker connection per worker process.
pub trait BrokerFactory: Send + Sync {
    /// Creates a fresh, unconnected broker.
    fn create(&self) -> Box<dyn Broker>;
}

impl<F> BrokerFactory for F
where
    F: Fn() -> Box<dyn Broker> + Send + Sync,
{
    fn create(&self) -> Box<dyn Broker> {
        self()
    }
}
