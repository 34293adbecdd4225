//! Rendering of query outcomes for standard output.

use serde::{Deserialize, Serialize};

use crate::controller::{QueryOutcome, SessionRef};
use crate::registry::RegistrySnapshot;
use crate::tail::{LineCount, TailResult};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table or preformatted block
    #[default]
    Text,
    /// Tagged JSON object
    Json,
}

const HEADERS: [&str; 4] = ["Index", "Session Name", "Window", "Tab"];

/// Renders query outcomes
#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter {
    format: OutputFormat,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render an outcome in the configured format
    pub fn render(&self, outcome: &QueryOutcome) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Text => Ok(render_text(outcome)),
            OutputFormat::Json => serde_json::to_string_pretty(outcome),
        }
    }
}

fn render_text(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Listing { sessions } => render_listing(sessions),
        QueryOutcome::Fallback { fragment, sessions } => {
            format!("not found: {}\n\n{}", fragment, render_listing(sessions))
        }
        QueryOutcome::Tail {
            session,
            requested,
            tail,
        } => render_tail(session, *requested, tail),
    }
}

/// Render a snapshot as an aligned `Index | Session Name | Window | Tab` table
pub fn render_listing(snapshot: &RegistrySnapshot) -> String {
    let rows: Vec<[String; 4]> = snapshot
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            [
                (i + 1).to_string(),
                entry.name.clone(),
                entry.window_index.to_string(),
                entry.tab_index.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[&str]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(format_row(&HEADERS[..]));
    lines.push(format!(
        "|{}|",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("|")
    ));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(format_row(&cells[..]));
    }
    if rows.is_empty() {
        lines.push("(no sessions)".to_string());
    }

    lines.join("\n")
}

/// Render a tail as a fenced block annotated with the session and line count
pub fn render_tail(session: &SessionRef, requested: LineCount, tail: &TailResult) -> String {
    let body = tail.text();
    let fence = "`".repeat(longest_backtick_run(&body).max(2) + 1);
    let extent = if tail.truncated {
        "truncated"
    } else {
        "whole buffer"
    };

    let mut out = format!(
        "Session: {} (window {}, tab {})\nLast {} lines requested ({} shown, {})\n{}text\n",
        session.name,
        session.window_index,
        session.tab_index,
        requested,
        tail.lines.len(),
        extent,
        fence
    );
    if !body.is_empty() {
        out.push_str(&body);
        out.push('\n');
    }
    out.push_str(&fence);
    out
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}
