//! Structured outcome reporting for patch runs.
//!
//! The engine never prints anything itself; it returns a [`PatchResult`]
//! and callers decide how (or whether) to render it.

use std::fmt;
use std::path::PathBuf;

/// Per-rule outcome of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    /// The rule matched and changed at least one unit of text.
    Applied,
    /// The idempotency guard recognized its own output; nothing was changed.
    SkippedAlreadyPatched,
    /// The rule's target is absent (already removed, renamed, or never present).
    NotFound,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatus::Applied => write!(f, "applied"),
            RuleStatus::SkippedAlreadyPatched => write!(f, "already patched"),
            RuleStatus::NotFound => write!(f, "not found"),
        }
    }
}

/// One rule's outcome, keyed by the rule's stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub rule_id: String,
    pub status: RuleStatus,
}

/// Result of applying a full plan to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for content_changed and per-rule outcomes"]
pub struct PatchResult {
    /// The target file, exactly as the plan named it.
    pub file: PathBuf,
    /// Per-rule outcomes in plan order.
    pub outcomes: Vec<PatchOutcome>,
    /// Whether the final content differs byte-for-byte from the original.
    pub content_changed: bool,
}

impl PatchResult {
    /// Look up the outcome of a specific rule.
    pub fn outcome(&self, rule_id: &str) -> Option<&PatchOutcome> {
        self.outcomes.iter().find(|o| o.rule_id == rule_id)
    }

    /// Count outcomes with the given status.
    pub fn count(&self, status: RuleStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl fmt::Display for PatchResult {
    /// One line per rule, suitable for direct terminal output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, outcome) in self.outcomes.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", outcome.rule_id, outcome.status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatchResult {
        PatchResult {
            file: PathBuf::from("templates/view.kt"),
            outcomes: vec![
                PatchOutcome {
                    rule_id: "school-name".to_string(),
                    status: RuleStatus::Applied,
                },
                PatchOutcome {
                    rule_id: "address".to_string(),
                    status: RuleStatus::SkippedAlreadyPatched,
                },
                PatchOutcome {
                    rule_id: "phone".to_string(),
                    status: RuleStatus::NotFound,
                },
            ],
            content_changed: true,
        }
    }

    #[test]
    fn test_display_one_line_per_rule() {
        let rendered = sample().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "school-name: applied");
        assert_eq!(lines[1], "address: already patched");
        assert_eq!(lines[2], "phone: not found");
    }

    #[test]
    fn test_outcome_lookup() {
        let result = sample();
        assert_eq!(
            result.outcome("address").map(|o| o.status),
            Some(RuleStatus::SkippedAlreadyPatched)
        );
        assert!(result.outcome("missing").is_none());
    }

    #[test]
    fn test_status_counts() {
        let result = sample();
        assert_eq!(result.count(RuleStatus::Applied), 1);
        assert_eq!(result.count(RuleStatus::SkippedAlreadyPatched), 1);
        assert_eq!(result.count(RuleStatus::NotFound), 1);
    }
}
