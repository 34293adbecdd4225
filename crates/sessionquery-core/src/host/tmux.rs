use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::command::{run_with_timeout, stderr_text};
use super::{HostKind, TerminalHost};
use crate::error::QueryError;
use crate::registry::{ContentHandle, HostSession};
use crate::tail::{LineCount, TailResult};

/// Regex pattern for tmux pane ids (e.g. `%12`)
static PANE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%\d+$").expect("Invalid PANE_ID_PATTERN regex"));

/// `list-panes` format. Window name goes last so tabs in it survive `splitn`.
const LIST_FORMAT: &str =
    "#{session_id}\t#{window_id}\t#{pane_id}\t#{pane_index}\t#{session_name}\t#{window_name}";

/// Validate a pane id before it is passed to tmux
fn validate_pane_id(handle: &str) -> Result<(), QueryError> {
    if !PANE_ID_PATTERN.is_match(handle) {
        return Err(QueryError::AutomationFailure {
            host: HostKind::Tmux,
            detail: format!("invalid tmux pane id: {}", handle),
        });
    }
    Ok(())
}

/// One row of `tmux list-panes -a`
#[derive(Debug, Clone, PartialEq, Eq)]
struct TmuxPane {
    session_id: String,
    window_id: String,
    pane_id: String,
    pane_index: u32,
    session_name: String,
    window_name: String,
}

impl TmuxPane {
    /// Parse a line produced with [`LIST_FORMAT`]
    fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.splitn(6, '\t').collect();
        if parts.len() < 6 {
            return None;
        }

        Some(Self {
            session_id: parts[0].to_string(),
            window_id: parts[1].to_string(),
            pane_id: parts[2].to_string(),
            pane_index: parts[3].parse().ok()?,
            session_name: parts[4].to_string(),
            window_name: parts[5].to_string(),
        })
    }

    /// Display name used for matching: `session:window.pane`
    fn display_name(&self) -> String {
        format!(
            "{}:{}.{}",
            self.session_name, self.window_name, self.pane_index
        )
    }

    fn into_host_session(self) -> HostSession {
        HostSession {
            name: self.display_name(),
            window_key: self.session_id,
            tab_key: self.window_id,
            handle: ContentHandle::new(self.pane_id),
        }
    }
}

/// Line range of a pane buffer covering its last n lines.
///
/// tmux numbers visible rows from 0 and history rows with negative numbers,
/// so the buffer spans `-history_size..=cursor_y`. When the cursor sits in
/// column 0 its row is usually the empty line after the last newline; one
/// extra row is captured so that row can be dropped without losing a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CaptureRange {
    start: i64,
    end: i64,
    total: usize,
    /// Cursor is in column 0; the last row is not part of the buffer if blank
    open_cursor_row: bool,
}

impl CaptureRange {
    fn new(geometry: PaneGeometry, lines: LineCount) -> Self {
        let end = geometry.cursor_y as i64;
        let earliest = -(geometry.history_size as i64);
        let open_cursor_row = geometry.cursor_x == 0;
        let wanted = i64::try_from(lines.get())
            .unwrap_or(i64::MAX)
            .saturating_add(i64::from(open_cursor_row));
        let start = (end + 1).saturating_sub(wanted).max(earliest);

        Self {
            start,
            end,
            total: (geometry.history_size + geometry.cursor_y + 1) as usize,
            open_cursor_row,
        }
    }

    /// Shape the captured rows into the last `lines` lines of the buffer
    fn tail(&self, window: &str, lines: LineCount) -> TailResult {
        let mut rows: Vec<&str> = window.lines().collect();
        let mut total = self.total;
        if self.open_cursor_row && rows.last().is_some_and(|row| row.trim().is_empty()) {
            rows.pop();
            total = total.saturating_sub(1);
        }
        TailResult::from_window(&rows.join("\n"), total, lines)
    }
}

/// Pane geometry as reported by `display-message`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PaneGeometry {
    history_size: u64,
    cursor_y: u64,
    cursor_x: u64,
}

impl PaneGeometry {
    const FORMAT: &'static str = "#{history_size}\t#{cursor_y}\t#{cursor_x}";

    /// Parse a reply produced with [`PaneGeometry::FORMAT`]
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('\t');
        let geometry = Self {
            history_size: parts.next()?.parse().ok()?,
            cursor_y: parts.next()?.parse().ok()?,
            cursor_x: parts.next()?.parse().ok()?,
        };
        parts.next().is_none().then_some(geometry)
    }
}

/// Map tmux stderr onto the error taxonomy
fn classify_failure(stderr: String, handle: Option<&str>) -> QueryError {
    if stderr.contains("no server running")
        || (stderr.contains("error connecting to") && stderr.contains("No such file or directory"))
    {
        QueryError::HostNotRunning {
            host: HostKind::Tmux,
            detail: stderr,
        }
    } else if stderr.contains("Permission denied") {
        QueryError::PermissionDenied {
            host: HostKind::Tmux,
            detail: stderr,
        }
    } else if let Some(handle) = handle.filter(|_| {
        stderr.contains("can't find pane")
            || stderr.contains("can't find window")
            || stderr.contains("can't find session")
    }) {
        QueryError::SessionGone {
            name: handle.to_string(),
            detail: stderr,
        }
    } else {
        QueryError::AutomationFailure {
            host: HostKind::Tmux,
            detail: stderr,
        }
    }
}

/// Client for a tmux server
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Server socket (`tmux -S`); default server when unset
    socket: Option<PathBuf>,
    /// Upper bound for every tmux invocation
    timeout: Duration,
}

impl TmuxClient {
    pub fn new(socket: Option<PathBuf>, timeout: Duration) -> Self {
        Self { socket, timeout }
    }

    fn args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(socket) = &self.socket {
            full.push("-S".to_string());
            full.push(socket.display().to_string());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    async fn tmux(
        &self,
        operation: &'static str,
        args: &[&str],
        handle: Option<&str>,
    ) -> Result<Output, QueryError> {
        let output = run_with_timeout(
            HostKind::Tmux,
            "tmux",
            &self.args(args),
            self.timeout,
            operation,
        )
        .await?;

        if !output.status.success() {
            return Err(classify_failure(stderr_text(&output), handle));
        }
        Ok(output)
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(5))
    }
}

impl TerminalHost for TmuxClient {
    fn kind(&self) -> HostKind {
        HostKind::Tmux
    }

    async fn enumerate(&self) -> Result<Vec<HostSession>, QueryError> {
        let output = self
            .tmux("list-panes", &["list-panes", "-a", "-F", LIST_FORMAT], None)
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| {
                let pane = TmuxPane::parse(line);
                if pane.is_none() {
                    tracing::debug!("Skipping malformed list-panes line: {:?}", line);
                }
                pane
            })
            .map(TmuxPane::into_host_session)
            .collect())
    }

    async fn read_tail(
        &self,
        handle: &ContentHandle,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        let pane_id = handle.as_str();
        validate_pane_id(pane_id)?;

        let reply = self
            .tmux(
                "display-message",
                &[
                    "display-message",
                    "-p",
                    "-t",
                    pane_id,
                    PaneGeometry::FORMAT,
                ],
                Some(pane_id),
            )
            .await?;
        let raw = String::from_utf8_lossy(&reply.stdout);
        let geometry = PaneGeometry::parse(&raw).ok_or_else(|| QueryError::AutomationFailure {
            host: HostKind::Tmux,
            detail: format!("unexpected pane geometry: {:?}", raw.trim()),
        })?;

        let range = CaptureRange::new(geometry, lines);
        let start = range.start.to_string();
        let end = range.end.to_string();

        let output = self
            .tmux(
                "capture-pane",
                &[
                    "capture-pane",
                    "-p",
                    "-t",
                    pane_id,
                    "-S",
                    start.as_str(),
                    "-E",
                    end.as_str(),
                ],
                Some(pane_id),
            )
            .await?;

        let window = String::from_utf8_lossy(&output.stdout);
        Ok(range.tail(&window, lines))
    }
}
