//! Transcript display helpers: line-range parsing and message formatting.

use anyhow::{Context, Result, bail};

use crate::models::MessageNode;

/// Requested display window over a transcript, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    /// None means "to the end".
    pub end: Option<usize>,
}

/// Parse a range argument: `7` (one message), `3-7` (inclusive span),
/// `5-` or `5+` (from 5 to the end).
pub fn parse_line_range(raw: &str) -> Result<LineRange> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Empty line range");
    }

    if let Some(start) = raw.strip_suffix('+').or_else(|| raw.strip_suffix('-')) {
        let start = parse_position(start)?;
        return Ok(LineRange { start, end: None });
    }

    if let Some((start, end)) = raw.split_once('-') {
        let start = parse_position(start)?;
        let end = parse_position(end)?;
        if end < start {
            bail!("Line range end {} is before start {}", end, start);
        }
        return Ok(LineRange {
            start,
            end: Some(end),
        });
    }

    let position = parse_position(raw)?;
    Ok(LineRange {
        start: position,
        end: Some(position),
    })
}

fn parse_position(raw: &str) -> Result<usize> {
    let position: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid line number: '{}'", raw.trim()))?;
    if position == 0 {
        bail!("Line numbers start at 1");
    }
    Ok(position)
}

/// One message rendered for the terminal, numbered within the transcript.
pub fn format_message(position: usize, message: &MessageNode) -> String {
    format!(
        "{:>4}  [{}] {}\n      {}",
        position,
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.role.label(),
        message.joined_text().replace('\n', "\n      ")
    )
}
