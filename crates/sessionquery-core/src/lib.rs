//! Core library for sessionquery.
//!
//! Enumerates the window → tab → session tree of a terminal host, resolves a
//! session by name fragment and reads a bounded tail of its output. The tail
//! is cut by the host adapter so a session's full scrollback never crosses
//! the automation boundary.

pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod host;
pub mod matcher;
pub mod registry;
pub mod tail;

pub use controller::{Query, QueryController, QueryOptions, QueryOutcome, QueryState};
pub use error::QueryError;
pub use format::{OutputFormat, ResultFormatter};
pub use host::{BackendChoice, HostBackend, HostKind, TerminalHost};
pub use registry::RegistrySnapshot;
pub use tail::{LineCount, TailResult};
