//! Error taxonomy for a single query.
//!
//! "Session not found" is deliberately absent: an unmatched name is a
//! successful fallback listing, not a failure.

use std::time::Duration;

use thiserror::Error;

use crate::host::HostKind;

/// Error type for query operations
#[derive(Debug, Error)]
pub enum QueryError {
    /// The terminal host application (or server) is not running
    #[error("{host} is not running: {detail}")]
    HostNotRunning { host: HostKind, detail: String },

    /// The calling process is not authorized to automate the host
    #[error("not authorized to control {host}: {detail}")]
    PermissionDenied { host: HostKind, detail: String },

    /// The session closed between enumeration and tail read
    #[error("session {name:?} is gone: {detail}")]
    SessionGone { name: String, detail: String },

    /// The requested line count is not a positive integer
    #[error("invalid line count: {value:?}")]
    InvalidLineCount { value: String },

    /// A host call did not finish within the configured timeout
    #[error("{host} did not answer {operation} within {limit:?}")]
    Timeout {
        host: HostKind,
        operation: &'static str,
        limit: Duration,
    },

    /// Any other host-boundary scripting failure
    #[error("{host} automation failed: {detail}")]
    AutomationFailure { host: HostKind, detail: String },
}

impl QueryError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::HostNotRunning { .. } => 1,
            Self::PermissionDenied { .. } => 2,
            Self::InvalidLineCount { .. } => 3,
            Self::Timeout { .. } => 4,
            Self::SessionGone { .. } => 5,
            Self::AutomationFailure { .. } => 6,
        }
    }

    /// Whether a single bounded retry may help
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::AutomationFailure { .. })
    }

    /// Human-readable hint telling the user how to fix the problem
    pub fn remediation(&self) -> String {
        match self {
            Self::HostNotRunning {
                host: HostKind::Iterm,
                ..
            } => "Start iTerm2 and open at least one session, then run the query again.".to_string(),
            Self::HostNotRunning {
                host: HostKind::Tmux,
                ..
            } => "Start a tmux server (e.g. `tmux new -s work`) or pass --socket for a non-default server.".to_string(),
            Self::PermissionDenied {
                host: HostKind::Iterm,
                ..
            } => "Allow this terminal to control iTerm2 under System Settings > Privacy & Security > Automation.".to_string(),
            Self::PermissionDenied {
                host: HostKind::Tmux,
                ..
            } => "Check that the tmux socket belongs to the current user (see `tmux -S <socket>`).".to_string(),
            Self::SessionGone { .. } => {
                "The session closed before its output could be read; run the query again to refresh the listing.".to_string()
            }
            Self::InvalidLineCount { .. } => {
                "The line count must be a positive integer, e.g. `sessionquery build 100`.".to_string()
            }
            Self::Timeout { .. } => {
                "The host is busy or hung; retry, or raise `timeout_secs` in the config file.".to_string()
            }
            Self::AutomationFailure { .. } => {
                "Run again with --debug to see the host commands that failed.".to_string()
            }
        }
    }
}
