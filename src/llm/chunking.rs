//! Document Chunking
//!
//! Long documents are split into overlapping windows, each analyzed
//! independently, then merged by a synthesis model call. The split is pure
//! string math and fully deterministic; window boundaries snap to a nearby
//! newline so scene breaks are not cut mid-line.

use serde_json::Value;
use tracing::{debug, info};

use super::budget::TokenBudget;
use super::fallback::FallbackSubmitter;
use super::prompt::BuiltPrompt;
use super::provider::ProviderRequest;
use crate::config::ChunkingSettings;
use crate::constants::chunking::BOUNDARY_SLACK_CHARS;
use crate::types::ProviderFailure;

/// Split `text` into overlapping windows of at most `max_chars` bytes
/// (plus boundary slack). Consecutive windows share `overlap` bytes of
/// context. A text that fits in one window is returned as-is.
///
/// Guarantees: every byte of the input appears in at least one window,
/// windows are returned in document order, and the same input always
/// produces the same split.
pub fn split_windows(text: &str, max_chars: usize, overlap: usize) -> Vec<&str> {
    if text.len() <= max_chars {
        return vec![text];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let tentative = floor_char_boundary(text, start + max_chars);
        let mut end = if tentative < text.len() {
            snap_to_newline(text, start, tentative)
        } else {
            text.len()
        };
        if end <= start {
            // Window smaller than one char; take the char whole
            end = ceil_char_boundary(text, start + 1);
        }
        windows.push(&text[start..end]);
        if end >= text.len() {
            break;
        }
        let next = floor_char_boundary(text, end.saturating_sub(overlap));
        // Overlap must never stall the scan
        start = if next > start { next } else { end };
    }
    windows
}

/// Prefer ending a window just after a newline within the slack region
/// around `end`. Falls back to `end` itself when the region has none. The
/// region never reaches back to `start`: a snapped end must keep the scan
/// advancing even when the window is smaller than the slack.
fn snap_to_newline(text: &str, start: usize, end: usize) -> usize {
    let lo = floor_char_boundary(text, end.saturating_sub(BOUNDARY_SLACK_CHARS).max(start + 1));
    let hi = floor_char_boundary(text, (end + BOUNDARY_SLACK_CHARS).min(text.len()));
    if lo >= hi {
        return end;
    }
    match text[lo..hi].rfind('\n') {
        Some(pos) => lo + pos + 1,
        None => end,
    }
}

/// Largest index `<= at` that lands on a char boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    let mut index = at;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest index `>= at` that lands on a char boundary.
fn ceil_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    let mut index = at;
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

// =============================================================================
// Chunked analysis
// =============================================================================

/// Result of a multi-window analysis run: the synthesized content plus
/// usage accounting across every call made.
#[derive(Debug)]
pub struct ChunkedOutcome {
    /// Synthesized structured content
    pub content: Value,
    /// Model that served the final synthesis call
    pub model: String,
    /// Tokens consumed across all window calls plus synthesis
    pub tokens: u64,
    pub windows: usize,
}

/// Analyze each window sequentially, then merge the partial results with a
/// synthesis call. Windows run in order so a failing window aborts the run
/// before further spend. The fallback policy applies per call.
pub async fn analyze_windows(
    submitter: &FallbackSubmitter,
    prompt: &BuiltPrompt,
    document: &str,
    budget: &TokenBudget,
    settings: &ChunkingSettings,
) -> Result<ChunkedOutcome, ProviderFailure> {
    let windows = split_windows(document, settings.max_chunk_chars, settings.overlap_chars);
    let total = windows.len();
    info!(windows = total, "Splitting document for chunked analysis");

    let mut partials: Vec<Value> = Vec::with_capacity(total);
    let mut tokens: u64 = 0;
    for (index, window) in windows.iter().enumerate() {
        debug!(window = index + 1, of = total, chars = window.len(), "Analyzing window");
        let request =
            ProviderRequest::new(prompt.system(), prompt.chunk_message(window, index, total));
        let response = submitter.submit(&request, budget).await?;
        tokens += response.usage.total();
        partials.push(response.content);
    }

    let request = ProviderRequest::new(prompt.system(), prompt.synthesis_message(&partials));
    let response = submitter.submit(&request, budget).await?;
    tokens += response.usage.total();

    Ok(ChunkedOutcome {
        content: response.content,
        model: response.model,
        tokens,
        windows: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offset_of(text: &str, window: &str) -> usize {
        window.as_ptr() as usize - text.as_ptr() as usize
    }

    #[test]
    fn test_short_text_is_one_window() {
        let text = "INT. OFFICE - DAY\nA short scene.";
        let windows = split_windows(text, 60_000, 5_000);
        assert_eq!(windows, vec![text]);
    }

    #[test]
    fn test_windows_cover_the_whole_text() {
        let text = "line one\n".repeat(2_000);
        let windows = split_windows(&text, 1_000, 100);
        assert!(windows.len() > 1);

        let mut covered_to = 0;
        for window in &windows {
            let start = offset_of(&text, window);
            assert!(start <= covered_to, "gap before offset {start}");
            covered_to = covered_to.max(start + window.len());
        }
        assert_eq!(covered_to, text.len());
    }

    #[test]
    fn test_windows_respect_size_bound() {
        let text = "x".repeat(10_000);
        for window in split_windows(&text, 1_000, 100) {
            assert!(window.len() <= 1_000 + BOUNDARY_SLACK_CHARS);
        }
    }

    #[test]
    fn test_boundary_snaps_to_newline() {
        // Newlines every 50 chars, well within the slack region
        let text = format!("{}\n", "a".repeat(49)).repeat(100);
        let windows = split_windows(&text, 1_000, 100);
        for window in &windows[..windows.len() - 1] {
            assert!(window.ends_with('\n'), "window did not end at a line break");
        }
    }

    #[test]
    fn test_window_smaller_than_slack_terminates() {
        // A newline shortly before the nominal cut must not snap a window
        // back to zero length
        let text = format!("{}\n{}", "x".repeat(40), "x".repeat(1_000));
        let windows = split_windows(&text, 50, 0);
        let mut covered_to = 0;
        for window in &windows {
            assert!(!window.is_empty());
            covered_to += window.len();
        }
        assert_eq!(covered_to, text.len());
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "scene text here\n".repeat(500);
        let a = split_windows(&text, 2_000, 200);
        let b = split_windows(&text, 2_000, 200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_text_never_splits_a_char() {
        let text = "세 명의 주인공이 등장한다\n".repeat(300);
        // Every returned slice is valid UTF-8 by construction; this exercises
        // the boundary flooring on a text where max_chars lands mid-char.
        let windows = split_windows(&text, 1_001, 97);
        assert!(windows.len() > 1);
        let joined: usize = windows.iter().map(|w| w.len()).sum();
        assert!(joined >= text.len());
    }

    proptest! {
        #[test]
        fn prop_every_byte_is_covered(
            text in "[ -~\n]{0,5000}",
            max in 1usize..1_000,
            overlap_raw in 0usize..1_000,
        ) {
            let overlap = overlap_raw % max;
            let windows = split_windows(&text, max, overlap);
            let mut covered_to = 0;
            for window in &windows {
                let start = offset_of(&text, window);
                prop_assert!(start <= covered_to);
                covered_to = covered_to.max(start + window.len());
            }
            prop_assert_eq!(covered_to, text.len());
        }
    }
}
