//! Ordered window → tab → session snapshot built from one host enumeration.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::QueryError;
use crate::host::TerminalHost;

/// Opaque host reference used only to request a tail.
///
/// Not `Clone`: a handle lives inside the snapshot that produced it.
#[derive(PartialEq, Eq)]
pub struct ContentHandle(String);

impl ContentHandle {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHandle({})", self.0)
    }
}

/// One session as reported by a host adapter, in host traversal order.
///
/// `window_key` and `tab_key` are host-native identifiers; the registry turns
/// them into 1-based ordinals.
#[derive(Debug)]
pub struct HostSession {
    pub window_key: String,
    pub tab_key: String,
    pub name: String,
    pub handle: ContentHandle,
}

/// A session row of a registry snapshot
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    /// 1-based window ordinal
    pub window_index: u32,
    /// 1-based tab ordinal within the window
    pub tab_index: u32,
    /// Session name (not unique)
    pub name: String,
    #[serde(skip)]
    pub(crate) handle: ContentHandle,
}

impl SessionEntry {
    /// Handle for tail requests
    pub fn handle(&self) -> &ContentHandle {
        &self.handle
    }
}

/// Immutable, ordered result of one enumeration
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    entries: Vec<SessionEntry>,
}

impl RegistrySnapshot {
    /// Build a snapshot from host-ordered sessions.
    ///
    /// Order is preserved exactly. Window ordinals are assigned by first
    /// appearance of a window key, tab ordinals by first appearance of a tab
    /// key within its window.
    pub fn from_host_order(sessions: Vec<HostSession>) -> Self {
        let mut windows: HashMap<String, u32> = HashMap::new();
        let mut tabs: HashMap<(String, String), u32> = HashMap::new();
        let mut tabs_per_window: HashMap<u32, u32> = HashMap::new();

        let entries = sessions
            .into_iter()
            .map(|session| {
                let next_window = windows.len() as u32 + 1;
                let window_index = *windows
                    .entry(session.window_key.clone())
                    .or_insert(next_window);

                let tab_index = *tabs
                    .entry((session.window_key, session.tab_key))
                    .or_insert_with(|| {
                        let count = tabs_per_window.entry(window_index).or_insert(0);
                        *count += 1;
                        *count
                    });

                SessionEntry {
                    window_index,
                    tab_index,
                    name: session.name,
                    handle: session.handle,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds snapshots from a terminal host
pub struct SessionRegistry<'a, H> {
    host: &'a H,
}

impl<'a, H: TerminalHost> SessionRegistry<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Enumerate the host once and return a fresh snapshot
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, QueryError> {
        let sessions = self.host.enumerate().await?;
        let snapshot = RegistrySnapshot::from_host_order(sessions);
        tracing::debug!("Enumerated {} sessions", snapshot.len());
        Ok(snapshot)
    }
}
