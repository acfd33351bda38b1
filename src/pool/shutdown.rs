//! # OS stop-signal intake.
//!
//! [`wait_for_stop_signal`] completes when the process receives SIGINT,
//! SIGTERM or SIGQUIT. Both the supervisor and every worker install it:
//! the supervisor turns it into runtime-token cancellation and SIGTERMs
//! its children; a worker turns its own SIGTERM into the cooperative stop
//! flag the dispatch loop checks at the top of each iteration.
//!
//! Signals never interrupt anything mid-flight; they only flip tokens that
//! are observed at defined checkpoints.

/// Waits for a termination signal.
///
/// Each call installs independent listeners. Returns `Ok(())` when any
/// signal arrives, or `Err` if listener registration fails.
pub async fn wait_for_stop_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
    Ok(())
}
