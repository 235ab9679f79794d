//! Linepatch: idempotent, rule-based text patching
//!
//! A small engine that applies an ordered list of declarative patch rules
//! to one file, with an explicit idempotency guard per rule. Files are
//! treated as opaque text; matchers are literal substrings, never syntax.
//!
//! # Architecture
//!
//! Everything folds through one pipeline: a [`PatchPlan`] binds an ordered
//! list of [`PatchRule`]s to a target file, and [`PatchEngine::apply`]
//! reads the file once, folds the rules over the content in plan order,
//! and writes back at most once, only when the result differs. The
//! structured [`PatchResult`] carries a per-rule outcome so callers own
//! all presentation.
//!
//! # Safety
//!
//! - Applying the same plan twice is a no-op on the second pass
//! - Atomic file writes (tempfile + fsync + rename)
//! - Plan validation runs before the target file is touched
//! - A rule that finds nothing is an outcome, never an abort
//!
//! # Example
//!
//! ```no_run
//! use linepatch::{Matcher, PatchEngine, PatchPlan, PatchRule};
//!
//! let plan = PatchPlan::new(
//!     "templates/ReportCardView.kt",
//!     vec![PatchRule::substitute(
//!         "hardcoded-date",
//!         "\"24/01/2026\"",
//!         "(reportCard.generatedDate ?: \"24/01/2026\")",
//!     )
//!     .with_guard(Matcher::Contains("generatedDate".to_string()))],
//! );
//!
//! match PatchEngine::new().apply(&plan) {
//!     Ok(result) => println!("{result}"),
//!     Err(e) => eprintln!("patch failed: {e}"),
//! }
//! ```

pub mod config;
pub mod engine;
pub mod plan;
pub mod report;
pub mod rule;
pub mod safety;
pub mod suggest;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PlanConfig};
pub use engine::{run_rules, EngineError, FileOp, PatchEngine};
pub use plan::{InvalidRuleError, PatchPlan, RuleIssue};
pub use report::{PatchOutcome, PatchResult, RuleStatus};
pub use rule::{AnchorPosition, Matcher, PatchRule, Scope, Transform};
pub use safety::{PathGuard, SafetyError};
pub use suggest::{closest_line, ClosestLine};
