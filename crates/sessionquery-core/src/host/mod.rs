//! Terminal host adapters.
//!
//! Each adapter exposes the same two capabilities, `enumerate` and
//! `read_tail`. The concrete adapter is picked once at startup and carried as
//! a [`HostBackend`] variant.

mod command;
pub mod iterm;
pub mod tmux;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::QueryError;
use crate::registry::{ContentHandle, HostSession};
use crate::tail::{LineCount, TailResult};

pub use iterm::ItermClient;
pub use tmux::TmuxClient;

/// Which terminal host an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Iterm,
    Tmux,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iterm => write!(f, "iTerm2"),
            Self::Tmux => write!(f, "tmux"),
        }
    }
}

/// Backend requested by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Detect from the environment
    #[default]
    Auto,
    /// iTerm2 through osascript (macOS)
    Iterm,
    /// tmux through its command line client
    Tmux,
}

impl BackendChoice {
    /// Resolve `Auto` against the current environment.
    ///
    /// Inside tmux (`$TMUX` set) the tmux backend wins; otherwise macOS uses
    /// iTerm2 and every other platform falls back to tmux.
    pub fn resolve(self) -> HostKind {
        match self {
            Self::Iterm => HostKind::Iterm,
            Self::Tmux => HostKind::Tmux,
            Self::Auto => {
                if std::env::var_os("TMUX").is_some_and(|v| !v.is_empty()) {
                    HostKind::Tmux
                } else if cfg!(target_os = "macos") {
                    HostKind::Iterm
                } else {
                    HostKind::Tmux
                }
            }
        }
    }
}

/// Capabilities every terminal host adapter provides
pub trait TerminalHost {
    /// Host this adapter talks to
    fn kind(&self) -> HostKind;

    /// List every session in window, tab, session order
    fn enumerate(&self) -> impl Future<Output = Result<Vec<HostSession>, QueryError>>;

    /// Read the last `lines` lines of a session, cut on the host side
    fn read_tail(
        &self,
        handle: &ContentHandle,
        lines: LineCount,
    ) -> impl Future<Output = Result<TailResult, QueryError>>;
}

/// Adapter selected at startup
#[derive(Debug)]
pub enum HostBackend {
    Iterm(ItermClient),
    Tmux(TmuxClient),
}

impl HostBackend {
    /// Build the adapter chosen by the settings
    pub fn from_settings(settings: &Settings) -> Self {
        let timeout = settings.timeout();
        let kind = settings.backend.resolve();
        tracing::debug!("Using {} backend (requested {:?})", kind, settings.backend);

        match kind {
            HostKind::Iterm => Self::Iterm(ItermClient::new(timeout)),
            HostKind::Tmux => Self::Tmux(TmuxClient::new(settings.tmux_socket(), timeout)),
        }
    }
}

impl TerminalHost for HostBackend {
    fn kind(&self) -> HostKind {
        match self {
            Self::Iterm(client) => client.kind(),
            Self::Tmux(client) => client.kind(),
        }
    }

    async fn enumerate(&self) -> Result<Vec<HostSession>, QueryError> {
        match self {
            Self::Iterm(client) => client.enumerate().await,
            Self::Tmux(client) => client.enumerate().await,
        }
    }

    async fn read_tail(
        &self,
        handle: &ContentHandle,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        match self {
            Self::Iterm(client) => client.read_tail(handle, lines).await,
            Self::Tmux(client) => client.read_tail(handle, lines).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_choice_ignores_environment() {
        temp_env::with_var("TMUX", Some("/tmp/tmux-1000/default,1,0"), || {
            assert_eq!(BackendChoice::Iterm.resolve(), HostKind::Iterm);
        });
        assert_eq!(BackendChoice::Tmux.resolve(), HostKind::Tmux);
    }

    #[test]
    fn test_auto_inside_tmux() {
        temp_env::with_var("TMUX", Some("/tmp/tmux-1000/default,1,0"), || {
            assert_eq!(BackendChoice::Auto.resolve(), HostKind::Tmux);
        });
    }

    #[test]
    fn test_auto_outside_tmux() {
        temp_env::with_var_unset("TMUX", || {
            let expected = if cfg!(target_os = "macos") {
                HostKind::Iterm
            } else {
                HostKind::Tmux
            };
            assert_eq!(BackendChoice::Auto.resolve(), expected);
        });
    }

    #[test]
    fn test_backend_from_settings() {
        let settings = Settings {
            backend: BackendChoice::Tmux,
            ..Settings::default()
        };
        let backend = HostBackend::from_settings(&settings);
        assert_eq!(backend.kind(), HostKind::Tmux);

        let settings = Settings {
            backend: BackendChoice::Iterm,
            ..Settings::default()
        };
        assert_eq!(HostBackend::from_settings(&settings).kind(), HostKind::Iterm);
    }

    #[test]
    fn test_host_kind_display() {
        assert_eq!(HostKind::Iterm.to_string(), "iTerm2");
        assert_eq!(HostKind::Tmux.to_string(), "tmux");
    }
}
