//! Query orchestration.
//!
//! One controller runs one query:
//!
//! ```text
//! Idle -> Listing -> Done
//! Idle -> Matching -> Extracting -> Done
//! Idle -> Matching -> FallbackListing -> Done
//! any  -> Failed   (host error)
//! ```

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::error::QueryError;
use crate::host::TerminalHost;
use crate::matcher::{find_session, MatchResult};
use crate::registry::{RegistrySnapshot, SessionEntry, SessionRegistry};
use crate::tail::{LineCount, TailExtractor, TailResult};

/// Single bounded retry for transient host failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub backoff: Duration,
}

/// Per-invocation configuration for the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Lines read when the query names no count
    pub default_lines: LineCount,
    pub retry: RetryPolicy,
}

/// What the user asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Name fragment; `None` lists every session
    pub fragment: Option<String>,
    /// Line count; `None` uses the configured default
    pub lines: Option<LineCount>,
}

impl Query {
    /// List every session
    pub fn listing() -> Self {
        Self::default()
    }

    /// Look up a session by name fragment
    pub fn lookup(fragment: impl Into<String>, lines: Option<LineCount>) -> Self {
        Self {
            fragment: Some(fragment.into()),
            lines,
        }
    }

    /// Build a query from raw positional arguments.
    ///
    /// An empty name means "no name given". The line count is validated here
    /// so a bad count fails before the host is touched.
    pub fn from_args(name: Option<String>, lines: Option<&str>) -> Result<Self, QueryError> {
        let lines = lines.map(LineCount::parse).transpose()?;
        Ok(Self {
            fragment: name.filter(|n| !n.is_empty()),
            lines,
        })
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Listing,
    Matching,
    Extracting,
    FallbackListing,
    Done,
    Failed,
}

/// Location of a session without its content handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRef {
    pub name: String,
    pub window_index: u32,
    pub tab_index: u32,
}

impl From<&SessionEntry> for SessionRef {
    fn from(entry: &SessionEntry) -> Self {
        Self {
            name: entry.name.clone(),
            window_index: entry.window_index,
            tab_index: entry.tab_index,
        }
    }
}

/// Successful result of a query
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueryOutcome {
    /// Every session, no name given
    Listing { sessions: RegistrySnapshot },
    /// Tail of the first matching session
    Tail {
        session: SessionRef,
        requested: LineCount,
        tail: TailResult,
    },
    /// No session matched; every session is listed instead
    Fallback {
        fragment: String,
        sessions: RegistrySnapshot,
    },
}

/// Runs a single query against a terminal host
pub struct QueryController<'a, H> {
    host: &'a H,
    options: QueryOptions,
    state: QueryState,
}

impl<'a, H: TerminalHost> QueryController<'a, H> {
    pub fn new(host: &'a H, options: QueryOptions) -> Self {
        Self {
            host,
            options,
            state: QueryState::Idle,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    fn transition(&mut self, next: QueryState) {
        tracing::debug!("Query state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the query to `Done`, or to `Failed` on a host error
    pub async fn run(&mut self, query: Query) -> Result<QueryOutcome, QueryError> {
        debug_assert_eq!(self.state, QueryState::Idle, "controller runs one query");

        let result = self.execute(query).await;
        match &result {
            Ok(_) => self.transition(QueryState::Done),
            Err(e) => {
                tracing::debug!("Query failed in {:?}: {}", self.state, e);
                self.transition(QueryState::Failed);
            }
        }
        result
    }

    async fn execute(&mut self, query: Query) -> Result<QueryOutcome, QueryError> {
        let Some(fragment) = query.fragment.filter(|f| !f.is_empty()) else {
            self.transition(QueryState::Listing);
            let sessions = self.snapshot().await?;
            return Ok(QueryOutcome::Listing { sessions });
        };

        self.transition(QueryState::Matching);
        let snapshot = self.snapshot().await?;

        match find_session(&snapshot, &fragment) {
            MatchResult::Found(entry) => {
                self.transition(QueryState::Extracting);
                let lines = query.lines.unwrap_or(self.options.default_lines);
                let tail = self.extract(entry, lines).await?;
                Ok(QueryOutcome::Tail {
                    session: SessionRef::from(entry),
                    requested: lines,
                    tail,
                })
            }
            MatchResult::NotFound => {
                tracing::info!("No session matches {:?}, listing all", fragment);
                self.transition(QueryState::FallbackListing);
                Ok(QueryOutcome::Fallback {
                    fragment,
                    sessions: snapshot,
                })
            }
        }
    }

    async fn snapshot(&self) -> Result<RegistrySnapshot, QueryError> {
        let host = self.host;
        with_retry(self.options.retry, "enumerate", move || async move {
            SessionRegistry::new(host).snapshot().await
        })
        .await
    }

    async fn extract(
        &self,
        entry: &SessionEntry,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        let host = self.host;
        with_retry(self.options.retry, "read tail", move || async move {
            TailExtractor::new(host).extract(entry, lines).await
        })
        .await
    }
}

/// Run `call`, retrying once after `backoff` when the policy allows and the
/// first error is transient
async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, QueryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    match call().await {
        Err(e) if policy.enabled && e.is_transient() => {
            tracing::warn!("{} failed ({}), retrying in {:?}", operation, e, policy.backoff);
            tokio::time::sleep(policy.backoff).await;
            call().await
        }
        other => other,
    }
}
