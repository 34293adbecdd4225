//! Bounded tail extraction.
//!
//! The "last n lines" cut happens inside the host adapters; this module only
//! validates the count, shapes the host reply and applies cosmetic trimming.

use std::fmt;
use std::num::{IntErrorKind, NonZeroUsize};

use serde::Serialize;

use crate::error::QueryError;
use crate::host::TerminalHost;
use crate::registry::SessionEntry;

/// Positive number of lines to read from the end of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineCount(NonZeroUsize);

impl LineCount {
    /// Line count used when the caller gives none
    pub const DEFAULT: LineCount = match NonZeroUsize::new(50) {
        Some(n) => LineCount(n),
        None => unreachable!(),
    };

    /// Largest count; anything above reads the whole buffer anyway
    pub const MAX: LineCount = LineCount(NonZeroUsize::MAX);

    pub fn new(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Self)
    }

    /// Parse a user-supplied count, rejecting zero, negatives and garbage.
    ///
    /// Counts too large for `usize` saturate to [`LineCount::MAX`].
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let parsed = match raw.trim().parse::<usize>() {
            Ok(n) => Self::new(n),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(Self::MAX),
            Err(_) => None,
        };
        parsed.ok_or_else(|| QueryError::InvalidLineCount {
            value: raw.to_string(),
        })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for LineCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LineCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lines read from the end of a session buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TailResult {
    /// At most the requested number of lines, oldest first
    pub lines: Vec<String>,
    /// The source buffer held more lines than requested
    pub truncated: bool,
}

impl TailResult {
    /// Shape a host reply.
    ///
    /// `window` is the text the host returned for the requested range and
    /// `total_lines` the size of the whole buffer as counted by the host. The
    /// window is clamped to its last `requested` lines in case the host
    /// returned more.
    pub fn from_window(window: &str, total_lines: usize, requested: LineCount) -> Self {
        let mut lines: Vec<String> = window.lines().map(str::to_string).collect();
        if lines.len() > requested.get() {
            lines.drain(..lines.len() - requested.get());
        }

        Self {
            lines,
            truncated: total_lines > requested.get(),
        }
    }

    /// Drop one leading and one trailing blank line; interior lines are kept
    pub fn normalized(mut self) -> Self {
        if self.lines.first().is_some_and(|l| l.trim().is_empty()) {
            self.lines.remove(0);
        }
        if self.lines.last().is_some_and(|l| l.trim().is_empty()) {
            self.lines.pop();
        }
        self
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Requests bounded tails for resolved sessions
pub struct TailExtractor<'a, H> {
    host: &'a H,
}

impl<'a, H: TerminalHost> TailExtractor<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Read the last `lines` lines of `entry`
    pub async fn extract(
        &self,
        entry: &SessionEntry,
        lines: LineCount,
    ) -> Result<TailResult, QueryError> {
        let tail = self
            .host
            .read_tail(entry.handle(), lines)
            .await
            .map_err(|e| match e {
                QueryError::SessionGone { detail, .. } => QueryError::SessionGone {
                    name: entry.name.clone(),
                    detail,
                },
                other => other,
            })?;

        tracing::debug!(
            "Read {} lines from {:?} (truncated={})",
            tail.lines.len(),
            entry.name,
            tail.truncated
        );
        Ok(tail.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::registry::SessionRegistry;
    use pretty_assertions::assert_eq;

    fn count(n: usize) -> LineCount {
        LineCount::new(n).expect("positive")
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_parse_line_count() {
        assert_eq!(LineCount::parse("50").expect("valid").get(), 50);
        assert_eq!(LineCount::parse(" 7 ").expect("valid").get(), 7);
        assert!(LineCount::parse("0").is_err());
        assert!(LineCount::parse("-5").is_err());
        assert!(LineCount::parse("ten").is_err());
        assert!(LineCount::parse("").is_err());
        assert!(LineCount::parse("1.5").is_err());
    }

    #[test]
    fn test_parse_huge_line_count_saturates() {
        let count = LineCount::parse("5000000000").expect("valid");
        assert!(count.get() >= u32::MAX as usize);
        assert_eq!(
            LineCount::parse("99999999999999999999999999").expect("valid"),
            LineCount::MAX
        );
        assert!(LineCount::parse("-99999999999999999999999999").is_err());
    }

    #[test]
    fn test_huge_count_returns_whole_buffer() {
        let buffer = numbered(120);
        let tail = TailResult::from_window(&buffer, 120, LineCount::MAX);
        assert!(!tail.truncated);
        assert_eq!(tail.lines.len(), 120);
    }

    #[test]
    fn test_invalid_line_count_error_kind() {
        let err = LineCount::parse("0").expect_err("zero is invalid");
        assert_eq!(err.exit_code(), 3);
        assert!(matches!(err, QueryError::InvalidLineCount { value } if value == "0"));
    }

    #[test]
    fn test_default_is_fifty() {
        assert_eq!(LineCount::default().get(), 50);
    }

    #[test]
    fn test_short_buffer_is_returned_whole() {
        let buffer = numbered(10);
        for n in [10, 11, 50] {
            let tail = TailResult::from_window(&buffer, 10, count(n));
            assert_eq!(tail.lines.len(), 10);
            assert_eq!(tail.text(), buffer);
            assert!(!tail.truncated);
        }
    }

    #[test]
    fn test_long_buffer_keeps_last_lines_in_order() {
        let buffer = numbered(120);
        let tail = TailResult::from_window(&buffer, 120, count(50));

        assert!(tail.truncated);
        assert_eq!(tail.lines.len(), 50);
        assert_eq!(tail.lines.first().map(String::as_str), Some("line 71"));
        assert_eq!(tail.lines.last().map(String::as_str), Some("line 120"));
        let expected: Vec<String> = (71..=120).map(|i| format!("line {}", i)).collect();
        assert_eq!(tail.lines, expected);
    }

    #[test]
    fn test_exact_window_from_host() {
        // Host already cut the range; total comes from the host's own count.
        let window = numbered(3);
        let tail = TailResult::from_window(&window, 900, count(3));
        assert!(tail.truncated);
        assert_eq!(tail.lines.len(), 3);
    }

    #[test]
    fn test_normalized_strips_single_edges_only() {
        let tail = TailResult {
            lines: vec!["", "", "a", "", "b", "", ""]
                .into_iter()
                .map(String::from)
                .collect(),
            truncated: false,
        }
        .normalized();

        assert_eq!(tail.lines, vec!["", "a", "", "b", ""]);
    }

    #[test]
    fn test_normalized_whitespace_line_counts_as_blank() {
        let tail = TailResult {
            lines: vec!["   ", "x", "\t"].into_iter().map(String::from).collect(),
            truncated: true,
        }
        .normalized();

        assert_eq!(tail.lines, vec!["x"]);
        assert!(tail.truncated);
    }

    #[test]
    fn test_normalized_empty() {
        let tail = TailResult {
            lines: vec![String::new()],
            truncated: false,
        }
        .normalized();
        assert!(tail.lines.is_empty());
    }

    #[tokio::test]
    async fn test_extract_lines_71_to_120() {
        let host = FakeHost::default().with_session("1", "1", "build", "h1", &numbered(120));
        let snapshot = SessionRegistry::new(&host).snapshot().await.expect("snapshot");
        let entry = &snapshot.entries()[0];

        let tail = TailExtractor::new(&host)
            .extract(entry, count(50))
            .await
            .expect("extract");

        assert!(tail.truncated);
        assert_eq!(tail.lines.first().map(String::as_str), Some("line 71"));
        assert_eq!(tail.lines.last().map(String::as_str), Some("line 120"));
    }

    #[tokio::test]
    async fn test_extract_renames_gone_session() {
        let host = FakeHost::default().with_session("1", "1", "build", "h1", "x");
        let snapshot = SessionRegistry::new(&host).snapshot().await.expect("snapshot");
        host.close_all();

        let err = TailExtractor::new(&host)
            .extract(&snapshot.entries()[0], count(5))
            .await
            .expect_err("session was closed");

        assert!(matches!(err, QueryError::SessionGone { ref name, .. } if name == "build"));
        assert_eq!(err.exit_code(), 5);
    }
}
