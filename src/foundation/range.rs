//! Parsing of human-entered frame lists such as `0-299`, `1,5,9` or `10~20；40`.
//!
//! Ranges written as `A-B` include both ends. Reversed bounds are swapped.

use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{FrameCutError, FrameCutResult};

/// Largest number of frames `parse_frame_sequence` will expand.
pub const MAX_SEQUENCE_FRAMES: u64 = 10_000_000;

/// Parse a frame list into sorted, de-duplicated frame indices.
pub fn parse_frame_sequence(input: &str) -> FrameCutResult<Vec<FrameIndex>> {
    let spans = parse_frame_spans(input)?;
    let total = spans
        .iter()
        .fold(0u64, |n, (a, b)| n.saturating_add(b.0 - a.0).saturating_add(1));
    if total > MAX_SEQUENCE_FRAMES {
        return Err(FrameCutError::validation(format!(
            "frame list '{}' expands to {total} frames (limit {MAX_SEQUENCE_FRAMES})",
            input.trim()
        )));
    }
    Ok(spans
        .into_iter()
        .flat_map(|(a, b)| (a.0..=b.0).map(FrameIndex))
        .collect())
}

/// Parse a frame list into sorted inclusive `(first, last)` spans, merging overlapping and
/// adjacent ones. Nothing is expanded, so huge bounds are cheap.
pub fn parse_frame_spans(input: &str) -> FrameCutResult<Vec<(FrameIndex, FrameIndex)>> {
    let normalized = normalize(input);
    let mut spans = Vec::new();

    for token in normalized
        .split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        match token.split_once('-') {
            Some((a, b)) => {
                let mut start = parse_bound(a, token)?;
                let mut end = parse_bound(b, token)?;
                if start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                spans.push((start, end));
            }
            None => {
                let f = parse_bound(token, token)?;
                spans.push((f, f));
            }
        }
    }

    spans.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    Ok(merged
        .into_iter()
        .map(|(a, b)| (FrameIndex(a), FrameIndex(b)))
        .collect())
}

/// Parse a frame list that must describe one contiguous run into a half-open [`FrameRange`].
pub fn parse_frame_range(input: &str) -> FrameCutResult<FrameRange> {
    match parse_frame_spans(input)?.as_slice() {
        [] => Err(FrameCutError::validation("frame sequence is empty")),
        [(first, last)] => {
            let end = last.0.checked_add(1).ok_or_else(|| {
                FrameCutError::validation(format!("frame {last} is too large"))
            })?;
            FrameRange::new(*first, FrameIndex(end))
        }
        _ => Err(FrameCutError::validation(format!(
            "frame list '{}' is not contiguous",
            input.trim()
        ))),
    }
}

fn parse_bound(text: &str, token: &str) -> FrameCutResult<u64> {
    text.trim().parse::<u64>().map_err(|_| {
        FrameCutError::validation(format!("invalid frame range token '{token}'"))
    })
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            '，' => ',',
            '；' => ';',
            '–' | '—' | '－' | '~' => '-',
            other => other,
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/range.rs"]
mod tests;
