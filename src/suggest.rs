//! Near-miss diagnostics for rules that found nothing.
//!
//! When a rule reports `NotFound`, the target pattern was usually renamed
//! or slightly edited rather than removed. Surfacing the closest line in
//! the file makes the fix obvious without opening an editor.

use strsim::normalized_levenshtein;

/// Minimum similarity for a line to count as a near miss.
const MIN_SCORE: f64 = 0.4;

/// The line most similar to a rule's target pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestLine {
    /// 1-based line number in the file
    pub line_number: usize,
    pub text: String,
    /// Normalized similarity in [0, 1]
    pub score: f64,
}

/// Scan content for the line closest to `needle`.
///
/// Lines are compared trimmed, so indentation differences don't drown the
/// signal. Returns `None` when nothing clears the similarity floor.
pub fn closest_line(content: &str, needle: &str) -> Option<ClosestLine> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }

    let mut best: Option<ClosestLine> = None;
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let score = normalized_levenshtein(needle, trimmed);
        if score >= MIN_SCORE && best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(ClosestLine {
                line_number: idx + 1,
                text: trimmed.to_string(),
                score,
            });
        }
    }
    best
}
