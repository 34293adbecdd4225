//! In-memory host for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::{HostKind, TerminalHost};
use crate::error::QueryError;
use crate::registry::{ContentHandle, HostSession};
use crate::tail::{LineCount, TailResult};

struct FakeSession {
    window: String,
    tab: String,
    name: String,
    handle: String,
    buffer: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeHost {
    sessions: Vec<FakeSession>,
    enumerate_failures: RefCell<VecDeque<QueryError>>,
    tail_failures: RefCell<VecDeque<QueryError>>,
    enumerate_calls: Cell<usize>,
    tail_calls: Cell<usize>,
    closed: Cell<bool>,
}

impl FakeHost {
    /// Three sessions; `debug-server` holds 120 numbered lines
    pub(crate) fn scenario() -> Self {
        let long: Vec<String> = (1..=120).map(|i| format!("line {}", i)).collect();
        Self::default()
            .with_session("1", "1", "debug-server", "h1", &long.join("\n"))
            .with_session("1", "2", "ssh-prod", "h2", "\n$ uptime\n up 3 days\n")
            .with_session("2", "1", "local-dev", "h3", "ready")
    }

    pub(crate) fn with_session(
        mut self,
        window: &str,
        tab: &str,
        name: &str,
        handle: &str,
        buffer: &str,
    ) -> Self {
        self.sessions.push(FakeSession {
            window: window.to_string(),
            tab: tab.to_string(),
            name: name.to_string(),
            handle: handle.to_string(),
            buffer: buffer.split('\n').map(str::to_string).collect(),
        });
        self
    }

    /// Queue an error for the next `enumerate` call
    pub(crate) fn fail_enumerate(self, err: QueryError) -> Self {
        self.enumerate_failures.borrow_mut().push_back(err);
        self
    }

    /// Queue an error for the next `read_tail` call
    pub(crate) fn fail_tail(self, err: QueryError) -> Self {
        self.tail_failures.borrow_mut().push_back(err);
        self
    }

    /// Simulate every session closing after enumeration
    pub(crate) fn close_all(&self) {
        self.closed.set(true);
    }

    pub(crate) fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.get()
    }

    pub(crate) fn tail_calls(&self) -> usize {
        self.tail_calls.get()
    }
}

impl TerminalHost for FakeHost {
    fn kind(&self) -> HostKind {
        HostKind::Tmux
    }

    async fn enumerate(&self) -> Result<Vec<HostSession>, QueryError> {
        self.enumerate_calls.set(self.enumerate_calls.get() + 1);
        if let Some(err) = self.enumerate_failures.borrow_mut().pop_front() {
            return Err(err);
        }

        Ok(self
            .sessions
            .iter()
            .map(|s| HostSession {
                window_key: s.window.clone(),
                tab_key: s.tab.clone(),
                name: s.name.clone(),
                handle: ContentHandle::new(s.handle.clone()),
            })
            .collect())
    }

    async fn read_tail(
        &self,
        handle: &ContentHandle,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        self.tail_calls.set(self.tail_calls.get() + 1);
        if let Some(err) = self.tail_failures.borrow_mut().pop_front() {
            return Err(err);
        }

        let session = self
            .sessions
            .iter()
            .find(|s| s.handle == handle.as_str())
            .filter(|_| !self.closed.get())
            .ok_or_else(|| QueryError::SessionGone {
                name: handle.as_str().to_string(),
                detail: format!("can't find pane: {}", handle.as_str()),
            })?;

        // Cut on the "host" side, the way the real adapters do.
        let total = session.buffer.len();
        let start = total.saturating_sub(lines.get());
        let window = session.buffer[start..].join("\n");
        Ok(TailResult::from_window(&window, total, lines))
    }
}
