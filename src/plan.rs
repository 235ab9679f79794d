//! A patch plan: an ordered rule list bound to one target file.
//!
//! Order matters. Rules fold left over the content, so a rule that inserts
//! a definition line can be followed by a rule that rewrites a usage of it.

use crate::rule::{Matcher, PatchRule, Scope, Transform};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    /// The one file this plan reads and (at most once) rewrites.
    pub file: PathBuf,
    pub rules: Vec<PatchRule>,
}

impl PatchPlan {
    pub fn new(file: impl Into<PathBuf>, rules: Vec<PatchRule>) -> Self {
        Self {
            file: file.into(),
            rules,
        }
    }

    /// Check the plan for configuration faults.
    ///
    /// A malformed rule is fatal for the whole plan and must be reported
    /// before any file is touched; partially applying a plan with a
    /// downstream fault can leave the target in an inconsistent state.
    pub fn validate(&self) -> Result<(), InvalidRuleError> {
        let mut issues = Vec::new();

        if self.file.as_os_str().is_empty() {
            issues.push(RuleIssue::MissingField {
                rule_id: None,
                field: "file",
            });
        }
        if self.rules.is_empty() {
            issues.push(RuleIssue::EmptyRuleList);
        }

        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(RuleIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            }

            if let Some(matcher) = &rule.matcher {
                check_matcher(matcher, &rule.id, "matcher", &mut issues);
            }
            if let Some(guard) = &rule.guard {
                check_matcher(guard, &rule.id, "guard", &mut issues);
            }

            match &rule.transform {
                Transform::Substitute { find, .. } => {
                    if find.is_empty() {
                        issues.push(RuleIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "transform.find",
                        });
                    }
                }
                Transform::RewriteLine { text, .. } => {
                    if text.trim().is_empty() {
                        issues.push(RuleIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "transform.text",
                        });
                    }
                    if rule.matcher.is_none() {
                        issues.push(RuleIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "matcher",
                        });
                    }
                    if rule.scope == Scope::WholeContent {
                        issues.push(RuleIssue::InvalidCombo {
                            rule_id: Some(rule.id.clone()),
                            message: "rewrite-line only applies at line-wise scope".to_string(),
                        });
                    }
                }
                Transform::Insert { lines, .. } => {
                    if lines.is_empty() {
                        issues.push(RuleIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "transform.lines",
                        });
                    }
                    // an insertion without an anchor matcher has nowhere to land
                    if rule.matcher.is_none() {
                        issues.push(RuleIssue::MissingField {
                            rule_id: Some(rule.id.clone()),
                            field: "matcher",
                        });
                    }
                    if rule.scope == Scope::WholeContent {
                        issues.push(RuleIssue::InvalidCombo {
                            rule_id: Some(rule.id.clone()),
                            message: "insert only applies at line-wise scope".to_string(),
                        });
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(InvalidRuleError { issues })
        }
    }
}

fn check_matcher(matcher: &Matcher, rule_id: &str, field: &'static str, issues: &mut Vec<RuleIssue>) {
    let empty = match matcher {
        Matcher::Contains(text) => text.is_empty(),
        Matcher::ContainsAll(all) => all.is_empty() || all.iter().any(|t| t.is_empty()),
    };
    if empty {
        issues.push(RuleIssue::MissingField {
            rule_id: Some(rule_id.to_string()),
            field,
        });
    }
}

/// Configuration fault in a plan, reported before any file is touched.
#[derive(Debug, Clone)]
pub struct InvalidRuleError {
    pub issues: Vec<RuleIssue>,
}

impl fmt::Display for InvalidRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidRuleError {}

#[derive(Debug, Clone)]
pub enum RuleIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleIssue::EmptyRuleList => write!(f, "plan contains no rules"),
            RuleIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "plan missing required field '{field}'"),
            },
            RuleIssue::InvalidCombo { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid plan configuration: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::AnchorPosition;

    #[test]
    fn test_valid_plan() {
        let plan = PatchPlan::new(
            "view.kt",
            vec![PatchRule::substitute("date", "\"24/01/2026\"", "${date}")],
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_empty_rule_list_is_invalid() {
        let plan = PatchPlan::new("view.kt", vec![]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("plan contains no rules"));
    }

    #[test]
    fn test_empty_file_path_is_invalid() {
        let plan = PatchPlan::new("", vec![PatchRule::substitute("r", "a", "b")]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("missing required field 'file'"));
    }

    #[test]
    fn test_missing_rule_id() {
        let plan = PatchPlan::new("view.kt", vec![PatchRule::substitute("  ", "a", "b")]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("missing required field 'id'"));
    }

    #[test]
    fn test_insert_requires_anchor_matcher() {
        let mut rule = PatchRule::insert(
            "ins",
            Matcher::Contains("anchor".to_string()),
            AnchorPosition::After,
            vec!["x".to_string()],
        );
        rule.matcher = None;
        let plan = PatchPlan::new("view.kt", vec![rule]);
        let err = plan.validate().unwrap_err();
        assert!(err
            .to_string()
            .contains("rule 'ins' missing required field 'matcher'"));
    }

    #[test]
    fn test_whole_content_insert_is_invalid_combo() {
        let mut rule = PatchRule::insert(
            "ins",
            Matcher::Contains("anchor".to_string()),
            AnchorPosition::Before,
            vec!["x".to_string()],
        );
        rule.scope = Scope::WholeContent;
        let plan = PatchPlan::new("view.kt", vec![rule]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("line-wise scope"));
    }

    #[test]
    fn test_empty_find_is_invalid() {
        let plan = PatchPlan::new("view.kt", vec![PatchRule::substitute("r", "", "b")]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("transform.find"));
    }

    #[test]
    fn test_empty_matcher_needle_is_invalid() {
        let rule = PatchRule::substitute("r", "a", "b")
            .with_matcher(Matcher::Contains(String::new()));
        let plan = PatchPlan::new("view.kt", vec![rule]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("matcher"));
    }

    #[test]
    fn test_multiple_issues_reported_together() {
        let plan = PatchPlan::new("", vec![]);
        let err = plan.validate().unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }
}
