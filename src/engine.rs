//! The patch engine: load, fold rules, conditionally persist.
//!
//! Side effects are limited to one read and at most one write of exactly
//! the path the plan names. The write is atomic (tempfile + fsync + rename)
//! so no concurrent reader can observe a partially patched file.

use crate::plan::{InvalidRuleError, PatchPlan};
use crate::report::{PatchOutcome, PatchResult};
use crate::rule::{self, PatchRule};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot {} {}: {}", .op, .path.display(), .source)]
    FileAccess {
        op: FileOp,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    InvalidRule(#[from] InvalidRuleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOp::Read => write!(f, "read"),
            FileOp::Write => write!(f, "write"),
        }
    }
}

/// Applies a [`PatchPlan`] to its target file.
///
/// The engine holds no state across invocations; constructing one is free.
#[derive(Debug, Clone, Default)]
#[must_use = "PatchEngine does nothing until apply() is called"]
pub struct PatchEngine {
    dry_run: bool,
}

impl PatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute outcomes without writing the file back.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply the plan's rules, in order, to the plan's target file.
    ///
    /// The file is rewritten only when the folded content differs
    /// byte-for-byte from the original; an all-`NotFound` run leaves the
    /// file (and its mtime) untouched. Plan validation runs first, so a
    /// malformed rule never touches the file at all.
    pub fn apply(&self, plan: &PatchPlan) -> Result<PatchResult, EngineError> {
        plan.validate()?;

        let original = fs::read_to_string(&plan.file).map_err(|source| EngineError::FileAccess {
            op: FileOp::Read,
            path: plan.file.clone(),
            source,
        })?;

        let (patched, outcomes) = run_rules(&plan.rules, &original);
        let content_changed = patched != original;

        if content_changed && !self.dry_run {
            atomic_write(&plan.file, patched.as_bytes()).map_err(|source| {
                EngineError::FileAccess {
                    op: FileOp::Write,
                    path: plan.file.clone(),
                    source,
                }
            })?;

            // the tempfile can carry an older mtime through the rename
            let now = filetime::FileTime::now();
            filetime::set_file_mtime(&plan.file, now).map_err(|source| {
                EngineError::FileAccess {
                    op: FileOp::Write,
                    path: plan.file.clone(),
                    source,
                }
            })?;
        }

        Ok(PatchResult {
            file: plan.file.clone(),
            outcomes,
            content_changed,
        })
    }
}

/// Fold a rule list over content, in order.
///
/// Each rule receives the content produced by its predecessors, never the
/// original, so rules may depend on earlier rules' output.
pub fn run_rules(rules: &[PatchRule], content: &str) -> (String, Vec<PatchOutcome>) {
    let mut current = content.to_string();
    let mut outcomes = Vec::with_capacity(rules.len());

    for patch_rule in rules {
        let (next, status) = rule::apply_rule(patch_rule, &current);
        if let Some(next) = next {
            current = next;
        }
        outcomes.push(PatchOutcome {
            rule_id: patch_rule.id.clone(),
            status,
        });
    }

    (current, outcomes)
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
///
/// Either the full write succeeds or the original content survives.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    // a bare relative path has an empty parent
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{AnchorPosition, Matcher, PatchRule};
    use crate::report::RuleStatus;

    fn write_target(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_apply_writes_patched_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(&dir, "template.html", "<h3>GROUPE SCOLAIRE</h3>\n");

        let plan = PatchPlan::new(
            &target,
            vec![PatchRule::substitute(
                "school-name",
                "GROUPE SCOLAIRE",
                "${schoolName}",
            )],
        );
        let result = PatchEngine::new().apply(&plan).unwrap();

        assert!(result.content_changed);
        assert_eq!(result.outcome("school-name").unwrap().status, RuleStatus::Applied);
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "<h3>${schoolName}</h3>\n"
        );
    }

    #[test]
    fn test_noop_run_leaves_file_and_mtime_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(&dir, "template.html", "nothing relevant here\n");

        let stale = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&target, stale).unwrap();

        let plan = PatchPlan::new(&target, vec![PatchRule::substitute("r", "absent", "x")]);
        let result = PatchEngine::new().apply(&plan).unwrap();

        assert!(!result.content_changed);
        assert_eq!(result.outcome("r").unwrap().status, RuleStatus::NotFound);
        assert_eq!(fs::read_to_string(&target).unwrap(), "nothing relevant here\n");

        let meta = fs::metadata(&target).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), stale);
    }

    #[test]
    fn test_dry_run_reports_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(&dir, "template.html", "old text\n");

        let plan = PatchPlan::new(&target, vec![PatchRule::substitute("r", "old", "new")]);
        let result = PatchEngine::new().dry_run(true).apply(&plan).unwrap();

        assert!(result.content_changed);
        assert_eq!(result.outcome("r").unwrap().status, RuleStatus::Applied);
        assert_eq!(fs::read_to_string(&target).unwrap(), "old text\n");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let plan = PatchPlan::new(
            "/nonexistent/template.html",
            vec![PatchRule::substitute("r", "a", "b")],
        );
        let err = PatchEngine::new().apply(&plan).unwrap_err();
        assert!(matches!(
            err,
            EngineError::FileAccess {
                op: FileOp::Read,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_plan_never_touches_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(&dir, "template.html", "old text\n");

        // the first rule would apply; the second is malformed
        let plan = PatchPlan::new(
            &target,
            vec![
                PatchRule::substitute("good", "old", "new"),
                PatchRule::substitute("bad", "", "x"),
            ],
        );
        let err = PatchEngine::new().apply(&plan).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule(_)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "old text\n");
    }

    #[test]
    fn test_second_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(
            &dir,
            "view.kt",
            "return \"24/01/2026\"\nval other = 1\n",
        );

        let plan = PatchPlan::new(
            &target,
            vec![PatchRule::substitute(
                "date",
                "\"24/01/2026\"",
                "(reportCard.generatedDate ?: \"24/01/2026\")",
            )
            .with_guard(Matcher::Contains("generatedDate".to_string()))],
        );

        let engine = PatchEngine::new();
        let first = engine.apply(&plan).unwrap();
        assert!(first.content_changed);
        assert_eq!(first.outcome("date").unwrap().status, RuleStatus::Applied);
        let after_first = fs::read_to_string(&target).unwrap();

        let second = engine.apply(&plan).unwrap();
        assert!(!second.content_changed);
        assert_eq!(
            second.outcome("date").unwrap().status,
            RuleStatus::SkippedAlreadyPatched
        );
        assert_eq!(fs::read_to_string(&target).unwrap(), after_first);
    }

    #[test]
    fn test_rules_see_cumulative_content() {
        // an insertion rule defines a value, then a rewrite rule references it
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(
            &dir,
            "view.kt",
            "row {\n    Text(subject.name, Modifier.weight(2.2f))\n    Text(subject.devoir?.toString() ?: \"-\")\n}\n",
        );

        let plan = PatchPlan::new(
            &target,
            vec![
                PatchRule::insert(
                    "define-devoirs",
                    Matcher::ContainsAll(vec![
                        "Text(subject.name".to_string(),
                        "Modifier.weight(2.2f)".to_string(),
                    ]),
                    AnchorPosition::Before,
                    vec!["    val devoirs = subject.evaluations.marks()".to_string()],
                ),
                PatchRule::rewrite_line(
                    "use-devoirs",
                    Matcher::Contains("subject.devoir?.toString()".to_string()),
                    "Text(devoirs, Modifier.weight(0.7f))",
                ),
            ],
        );

        let result = PatchEngine::new().apply(&plan).unwrap();
        assert!(result.content_changed);
        assert_eq!(result.count(RuleStatus::Applied), 2);

        let patched = fs::read_to_string(&target).unwrap();
        let definition = patched.find("val devoirs =").unwrap();
        let usage = patched.find("Text(devoirs,").unwrap();
        assert!(definition < usage);
    }

    #[test]
    fn test_run_rules_reports_in_plan_order() {
        let rules = vec![
            PatchRule::substitute("first", "a", "b"),
            PatchRule::substitute("second", "zz", "yy"),
        ];
        let (out, outcomes) = run_rules(&rules, "a zz a");
        assert_eq!(out, "b yy b");
        assert_eq!(outcomes[0].rule_id, "first");
        assert_eq!(outcomes[1].rule_id, "second");
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(&dir, "t.txt", "original");
        atomic_write(&target, b"replaced").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "replaced");
    }
}
