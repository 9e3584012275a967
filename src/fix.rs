//! Text edits and their application
//!
//! A fix is an ordered list of [`Edit`]s. Edits of one fix must not overlap;
//! they are applied from the bottom of the file up so that earlier offsets
//! stay valid, which makes the result independent of list order.

use crate::ast::{Location, Range};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Replace the text in `range` by `replacement`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
    pub range: Range,
    pub replacement: String,
}

impl Edit {
    pub fn replace_range_by(range: Range, replacement: &str) -> Self {
        Self {
            range,
            replacement: replacement.to_string(),
        }
    }

    pub fn remove_range(range: Range) -> Self {
        Self::replace_range_by(range, "")
    }

    pub fn insert_at(location: Location, text: &str) -> Self {
        Self::replace_range_by(Range::new(location, location), text)
    }
}

/// Why a set of edits could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixProblem {
    #[error("edits of the fix overlap")]
    Overlapping,

    #[error("the fix does not change the source")]
    Unchanged,

    #[error("edit range {range} lies outside of the source")]
    InvalidRange { range: Range },
}

/// Apply non-overlapping edits to `source`
///
/// Fails without touching the input when edits overlap, point outside of the
/// source, or leave the text unchanged.
pub fn apply_edits(source: &str, edits: &[Edit]) -> Result<String, FixProblem> {
    let line_starts = line_starts(source);

    let mut spans = Vec::with_capacity(edits.len());
    for edit in edits {
        let invalid = || FixProblem::InvalidRange { range: edit.range };
        let start = byte_offset(source, &line_starts, edit.range.start).ok_or_else(invalid)?;
        let end = byte_offset(source, &line_starts, edit.range.end).ok_or_else(invalid)?;
        if start > end {
            return Err(invalid());
        }
        spans.push((start, end, edit.replacement.as_str()));
    }

    spans.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    // Two edits at the same start are ambiguous even when one is an insertion
    if spans
        .windows(2)
        .any(|pair| pair[1].0 < pair[0].1 || pair[1].0 == pair[0].0)
    {
        return Err(FixProblem::Overlapping);
    }

    let mut result = source.to_string();
    for (start, end, replacement) in spans.iter().rev() {
        result.replace_range(*start..*end, replacement);
    }

    if result == source {
        return Err(FixProblem::Unchanged);
    }
    Ok(result)
}

/// Text of `source` covered by `range`
pub fn source_in_range(source: &str, range: Range) -> Option<&str> {
    let line_starts = line_starts(source);
    let start = byte_offset(source, &line_starts, range.start)?;
    let end = byte_offset(source, &line_starts, range.end)?;
    source.get(start..end)
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(index, _)| index + 1))
        .collect()
}

/// Convert a 1-based row/column location into a byte offset
fn byte_offset(source: &str, line_starts: &[usize], location: Location) -> Option<usize> {
    if location.row == 0 || location.column == 0 {
        return None;
    }
    let row = (location.row - 1) as usize;
    let column = (location.column - 1) as usize;

    let start = *line_starts.get(row)?;
    let line_end = source[start..]
        .find('\n')
        .map(|index| start + index)
        .unwrap_or(source.len());
    let line = &source[start..line_end];

    if column == line.chars().count() {
        return Some(line_end);
    }
    line.char_indices()
        .nth(column)
        .map(|(index, _)| start + index)
}
