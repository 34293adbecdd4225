//! iTerm2 adapter driven through `osascript`.
//!
//! Both scripts refuse to launch iTerm2: they check `is running` before the
//! `tell` block. The tail script cuts the last n paragraphs inside iTerm2 and
//! prefixes the reply with the full paragraph count.

use std::process::Output;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::command::{run_with_timeout, stderr_text};
use super::{HostKind, TerminalHost};
use crate::error::QueryError;
use crate::registry::{ContentHandle, HostSession};
use crate::tail::{LineCount, TailResult};

/// AppleScript error number at the end of an osascript error line
static ERROR_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((-?\d+)\)\s*$").expect("Invalid ERROR_NUMBER_PATTERN regex"));

/// iTerm2 session ids are UUID-like
static SESSION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9:-]+$").expect("Invalid SESSION_ID_PATTERN regex"));

/// Raised by our scripts when iTerm2 is not running
const ERR_NOT_RUNNING: i64 = 1001;
/// Raised by the tail script when the session id no longer exists
const ERR_SESSION_GONE: i64 = 1002;
/// Application isn't running
const ERR_APP_NOT_RUNNING: i64 = -600;
/// Can't get object (a session vanished mid-iteration)
const ERR_CANT_GET: i64 = -1728;
/// Not authorized to send Apple events
const ERR_NOT_AUTHORIZED: i64 = -1743;
/// Consent prompt pending or dismissed
const ERR_CONSENT_REQUIRED: i64 = -1744;
/// Syntax errors: iTerm2 terminology could not be loaded (app missing)
const ERR_SYNTAX: [i64; 2] = [-2740, -2741];

/// Largest AppleScript integer; `as integer` fails above it
const APPLESCRIPT_MAX_INT: usize = 536_870_911;

const ENUMERATE_SCRIPT: &str = r#"on run argv
    if not (application "iTerm2" is running) then error "iTerm2 is not running" number 1001
    set sep to character id 9
    set nl to character id 10
    set out to ""
    tell application "iTerm2"
        set wi to 0
        repeat with w in windows
            set wi to wi + 1
            set ti to 0
            repeat with t in tabs of w
                set ti to ti + 1
                repeat with s in sessions of t
                    set out to out & (wi as text) & sep & (ti as text) & sep & (id of s) & sep & (name of s) & nl
                end repeat
            end repeat
        end repeat
    end tell
    return out
end run"#;

const READ_TAIL_SCRIPT: &str = r#"on run argv
    set targetId to item 1 of argv
    set wanted to (item 2 of argv) as integer
    if not (application "iTerm2" is running) then error "iTerm2 is not running" number 1001
    set nl to character id 10
    tell application "iTerm2"
        repeat with w in windows
            repeat with t in tabs of w
                repeat with s in sessions of t
                    if (id of s) is targetId then
                        set ps to paragraphs of (contents of s)
                        set total to count of ps
                        if total > wanted then set ps to items (total - wanted + 1) thru total of ps
                        set AppleScript's text item delimiters to nl
                        set body to ps as text
                        set AppleScript's text item delimiters to ""
                        return (total as text) & nl & body
                    end if
                end repeat
            end repeat
        end repeat
    end tell
    error "session " & targetId & " no longer exists" number 1002
end run"#;

/// Extract the trailing AppleScript error number from osascript stderr
fn error_number(stderr: &str) -> Option<i64> {
    ERROR_NUMBER_PATTERN
        .captures(stderr)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Map an osascript failure onto the error taxonomy
fn classify_failure(stderr: String, handle: Option<&str>) -> QueryError {
    let number = error_number(&stderr);
    match (number, handle) {
        (Some(ERR_NOT_RUNNING | ERR_APP_NOT_RUNNING), _) => QueryError::HostNotRunning {
            host: HostKind::Iterm,
            detail: stderr,
        },
        (Some(n), _) if ERR_SYNTAX.contains(&n) => QueryError::HostNotRunning {
            host: HostKind::Iterm,
            detail: stderr,
        },
        (Some(ERR_NOT_AUTHORIZED | ERR_CONSENT_REQUIRED), _) => QueryError::PermissionDenied {
            host: HostKind::Iterm,
            detail: stderr,
        },
        (Some(ERR_SESSION_GONE | ERR_CANT_GET), Some(handle)) => QueryError::SessionGone {
            name: handle.to_string(),
            detail: stderr,
        },
        _ => QueryError::AutomationFailure {
            host: HostKind::Iterm,
            detail: stderr,
        },
    }
}

/// Parse `window\ttab\tid\tname` rows from the enumerate script
fn parse_sessions(stdout: &str) -> Vec<HostSession> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.splitn(4, '\t').collect();
            if parts.len() < 4 {
                tracing::debug!("Skipping malformed iTerm2 row: {:?}", line);
                return None;
            }
            Some(HostSession {
                window_key: parts[0].to_string(),
                tab_key: parts[1].to_string(),
                handle: ContentHandle::new(parts[2]),
                name: parts[3].to_string(),
            })
        })
        .collect()
}

/// Parse `total\n<lines>` from the tail script
fn parse_tail(stdout: &str, lines: LineCount) -> Option<TailResult> {
    let (total, body) = stdout.split_once('\n').unwrap_or((stdout, ""));
    let total: usize = total.trim().parse().ok()?;
    Some(TailResult::from_window(body, total, lines))
}

/// Client for iTerm2's AppleScript interface
#[derive(Debug, Clone)]
pub struct ItermClient {
    /// Upper bound for every osascript invocation
    timeout: Duration,
}

impl ItermClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn osascript(
        &self,
        operation: &'static str,
        script: &str,
        argv: &[&str],
        handle: Option<&str>,
    ) -> Result<Output, QueryError> {
        let mut args = vec!["-e".to_string(), script.to_string()];
        args.extend(argv.iter().map(|a| a.to_string()));

        let output =
            run_with_timeout(HostKind::Iterm, "osascript", &args, self.timeout, operation).await?;

        if !output.status.success() {
            return Err(classify_failure(stderr_text(&output), handle));
        }
        Ok(output)
    }
}

impl Default for ItermClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TerminalHost for ItermClient {
    fn kind(&self) -> HostKind {
        HostKind::Iterm
    }

    async fn enumerate(&self) -> Result<Vec<HostSession>, QueryError> {
        let output = self
            .osascript("enumerate", ENUMERATE_SCRIPT, &[], None)
            .await?;
        Ok(parse_sessions(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn read_tail(
        &self,
        handle: &ContentHandle,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        let session_id = handle.as_str();
        if !SESSION_ID_PATTERN.is_match(session_id) {
            return Err(QueryError::AutomationFailure {
                host: HostKind::Iterm,
                detail: format!("invalid iTerm2 session id: {}", session_id),
            });
        }

        let wanted = lines.get().min(APPLESCRIPT_MAX_INT).to_string();
        let output = self
            .osascript(
                "read-tail",
                READ_TAIL_SCRIPT,
                &[session_id, wanted.as_str()],
                Some(session_id),
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_tail(&stdout, lines).ok_or_else(|| QueryError::AutomationFailure {
            host: HostKind::Iterm,
            detail: "tail reply is missing the line count".to_string(),
        })
    }
}
