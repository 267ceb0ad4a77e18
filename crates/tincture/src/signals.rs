//! What ends a console session.
//!
//! The server stops on the first of: an interrupt from the operator, a
//! termination request from the supervisor, the controlling terminal hanging
//! up, or stdin reaching end of input.

use std::fmt;
use std::io;
use tokio::signal;

/// Why the chat server is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// SIGINT, or Ctrl+C on Windows.
    Interrupted,
    /// SIGTERM.
    Terminated,
    /// SIGHUP: the operator's terminal went away.
    HungUp,
    /// Console input reached end of file.
    InputClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Interrupted => "interrupted",
            StopReason::Terminated => "terminated",
            StopReason::HungUp => "terminal hung up",
            StopReason::InputClosed => "console input closed",
        })
    }
}

/// Waits for the first stop signal.
///
/// # Returns
///
/// The signal that arrived, or the error from registering a handler. Console
/// EOF is detected by the caller, never here.
pub async fn stop_requested() -> io::Result<StopReason> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;

        let reason = tokio::select! {
            _ = interrupt.recv() => StopReason::Interrupted,
            _ = terminate.recv() => StopReason::Terminated,
            _ = hangup.recv() => StopReason::HungUp,
        };
        Ok(reason)
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        Ok(StopReason::Interrupted)
    }
}
