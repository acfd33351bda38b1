//! # Child-process launching and the role handoff protocol.
//!
//! Workers are separate OS processes: the supervisor re-executes its own
//! binary and tells the child what to be through the environment. That
//! substitutes spawn+exec for classic fork semantics while keeping the
//! isolation guarantee — no shared mutable state between workers, only
//! process identities tracked by the parent.
//!
//! ## Handoff protocol
//! ```text
//! GEARVISOR_ROLE      "worker" | "validator"   (absent = supervisor)
//! GEARVISOR_CONFIG    ResolvedConfig as JSON
//! GEARVISOR_FUNCTIONS JSON array of bare function names (worker only)
//! ```
//! The child re-enters [`Pool::run`](crate::Pool::run), which reads these
//! variables and takes the matching branch. The serialized config wins
//! over whatever the child's own startup resolved, so every process in
//! the pool works from one byte-identical plan.
//!
//! ## Seams
//! [`Launcher`] and [`ChildHandle`] abstract the actual process control so
//! supervision logic stays testable with in-memory fakes. [`ExecLauncher`]
//! is the real thing: `tokio::process` for spawn/wait, SIGTERM via `nix`
//! for graceful stop, SIGKILL for escalation.

use std::path::PathBuf;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::config::ResolvedConfig;
use crate::error::{ConfigError, PoolError};

/// Role selector variable.
pub const ROLE_ENV: &str = "GEARVISOR_ROLE";
/// Serialized [`ResolvedConfig`] for child processes.
pub const CONFIG_ENV: &str = "GEARVISOR_CONFIG";
/// Serialized function set for worker processes.
pub const FUNCTIONS_ENV: &str = "GEARVISOR_FUNCTIONS";

const ROLE_WORKER: &str = "worker";
const ROLE_VALIDATOR: &str = "validator";

/// What a child process is asked to become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchRole {
    /// A dispatch-loop worker serving the given bare function names.
    Worker {
        /// Function set of the worker's group.
        functions: Vec<String>,
    },
    /// The short-lived pre-flight validator.
    Validator,
}

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, when the child exited normally.
    pub code: Option<i32>,
    /// Terminating signal, when it did not.
    pub signal: Option<i32>,
}

impl ChildExit {
    /// A zero exit status.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Signal description for the log, when there is no exit code.
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit status {code}"),
            (None, Some(sig)) => format!("killed by signal {sig}"),
            (None, None) => "reaped without status".to_string(),
        }
    }
}

/// Handle to one launched child process.
#[async_trait]
pub trait ChildHandle: Send {
    /// OS process id of the child.
    fn pid(&self) -> u32;

    /// Waits for the child to exit and reaps it.
    async fn wait(&mut self) -> std::io::Result<ChildExit>;

    /// Requests a graceful stop (SIGTERM).
    fn terminate(&self);

    /// Forcibly kills the child (SIGKILL).
    fn kill(&mut self);
}

/// Spawns pool child processes.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Starts one child in the given role.
    async fn launch(&self, role: LaunchRole) -> Result<Box<dyn ChildHandle>, PoolError>;
}

/// The production launcher: re-executes the current binary with the role
/// handoff in the environment.
pub struct ExecLauncher {
    exe: PathBuf,
    config_json: String,
}

impl ExecLauncher {
    /// Builds a launcher shipping `cfg` to every child.
    pub fn from_config(cfg: &ResolvedConfig) -> Result<Self, PoolError> {
        let exe = std::env::current_exe().map_err(|e| PoolError::Spawn {
            reason: format!("cannot locate own executable: {e}"),
        })?;
        let config_json = serde_json::to_string(cfg).map_err(|e| PoolError::Spawn {
            reason: format!("cannot serialize config for handoff: {e}"),
        })?;
        Ok(Self { exe, config_json })
    }
}

#[async_trait]
impl Launcher for ExecLauncher {
    async fn launch(&self, role: LaunchRole) -> Result<Box<dyn ChildHandle>, PoolError> {
        let mut cmd = Command::new(&self.exe);
        cmd.env(CONFIG_ENV, &self.config_json);
        match &role {
            LaunchRole::Worker { functions } => {
                let encoded = serde_json::to_string(functions).map_err(|e| PoolError::Spawn {
                    reason: format!("cannot serialize function set: {e}"),
                })?;
                cmd.env(ROLE_ENV, ROLE_WORKER).env(FUNCTIONS_ENV, encoded);
            }
            LaunchRole::Validator => {
                cmd.env(ROLE_ENV, ROLE_VALIDATOR);
            }
        }
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| PoolError::Spawn {
            reason: format!("{}: {e}", self.exe.display()),
        })?;
        let pid = child.id().ok_or_else(|| PoolError::Spawn {
            reason: "child reaped before it was tracked".to_string(),
        })?;
        Ok(Box::new(ExecChild { pid, child }))
    }
}

struct ExecChild {
    pid: u32,
    child: Child,
}

#[async_trait]
impl ChildHandle for ExecChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> std::io::Result<ChildExit> {
        let status = self.child.wait().await?;
        use std::os::unix::process::ExitStatusExt;
        Ok(ChildExit { code: status.code(), signal: status.signal() })
    }

    fn terminate(&self) {
        let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
    }

    fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// The branch a pool process takes, decided by the environment.
#[derive(Debug, Clone)]
pub(crate) enum ProcessRole {
    /// No role variable: this is the supervisor.
    Supervisor,
    /// Dispatch-loop worker with its handed-off config and function set.
    Worker {
        cfg: Box<ResolvedConfig>,
        functions: Vec<String>,
    },
    /// Pre-flight validator with its handed-off config.
    Validator { cfg: Box<ResolvedConfig> },
}

/// Reads the role handoff. Absent role variable means supervisor; a
/// present but corrupt handoff is a hard error, not a silent fallback.
pub(crate) fn role_from_env() -> Result<ProcessRole, ConfigError> {
    let role = match std::env::var(ROLE_ENV) {
        Err(_) => return Ok(ProcessRole::Supervisor),
        Ok(role) => role,
    };

    let cfg: ResolvedConfig = {
        let raw = std::env::var(CONFIG_ENV).map_err(|_| ConfigError::Handoff {
            reason: format!("{CONFIG_ENV} missing for role {role}"),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Handoff {
            reason: format!("{CONFIG_ENV} does not deserialize: {e}"),
        })?
    };

    match role.as_str() {
        ROLE_VALIDATOR => Ok(ProcessRole::Validator { cfg: Box::new(cfg) }),
        ROLE_WORKER => {
            let raw = std::env::var(FUNCTIONS_ENV).map_err(|_| ConfigError::Handoff {
                reason: format!("{FUNCTIONS_ENV} missing for worker role"),
            })?;
            let functions: Vec<String> =
                serde_json::from_str(&raw).map_err(|e| ConfigError::Handoff {
                    reason: format!("{FUNCTIONS_ENV} does not deserialize: {e}"),
                })?;
            Ok(ProcessRole::Worker { cfg: Box::new(cfg), functions })
        }
        other => Err(ConfigError::Handoff { reason: format!("unknown role {other}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_exit_classification() {
        assert!(ChildExit { code: Some(0), signal: None }.success());
        assert!(!ChildExit { code: Some(1), signal: None }.success());
        assert!(!ChildExit { code: None, signal: Some(9) }.success());
        assert_eq!(ChildExit { code: None, signal: Some(9) }.describe(), "killed by signal 9");
        assert_eq!(ChildExit { code: Some(2), signal: None }.describe(), "exit status 2");
    }
}
