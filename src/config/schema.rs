//! Serde schema for TOML plan files.
//!
//! A plan file binds one target file to an ordered rule list:
//!
//! ```toml
//! [meta]
//! name = "report-card-fixes"
//! file = "templates/ReportCardView.kt"
//! root_relative = true
//!
//! [[rules]]
//! id = "hardcoded-date"
//! scope = "whole-content"
//!
//! [rules.guard]
//! type = "contains"
//! text = "generatedDate"
//!
//! [rules.transform]
//! type = "substitute"
//! find = '"24/01/2026"'
//! replace = '(reportCard.generatedDate ?: "24/01/2026")'
//! ```

use crate::plan::PatchPlan;
use crate::rule::{AnchorPosition, Matcher, PatchRule, Scope, Transform};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlanConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl PlanConfig {
    /// Build the core plan, resolving a relative target against `root`
    /// when the plan asks for it.
    pub fn to_plan(&self, root: Option<&Path>) -> PatchPlan {
        let file = match root {
            Some(root) if self.meta.root_relative => root.join(&self.meta.file),
            _ => PathBuf::from(&self.meta.file),
        };
        let rules = self.rules.iter().map(RuleDefinition::to_rule).collect();
        PatchPlan::new(file, rules)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The one file this plan patches.
    #[serde(default)]
    pub file: String,
    /// Resolve `file` against the CLI root instead of the working directory.
    #[serde(default)]
    pub root_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub scope: ScopeDef,
    #[serde(default)]
    pub matcher: Option<MatcherDef>,
    #[serde(default)]
    pub guard: Option<MatcherDef>,
    pub transform: TransformDef,
}

impl RuleDefinition {
    fn to_rule(&self) -> PatchRule {
        PatchRule {
            id: self.id.clone(),
            scope: match self.scope {
                ScopeDef::WholeContent => Scope::WholeContent,
                ScopeDef::LineWise => Scope::LineWise,
            },
            matcher: self.matcher.as_ref().map(MatcherDef::to_matcher),
            guard: self.guard.as_ref().map(MatcherDef::to_matcher),
            transform: self.transform.to_transform(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeDef {
    WholeContent,
    LineWise,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatcherDef {
    /// The unit contains this exact text
    Contains { text: String },
    /// The unit contains every listed text
    ContainsAll { all: Vec<String> },
}

impl MatcherDef {
    fn to_matcher(&self) -> Matcher {
        match self {
            MatcherDef::Contains { text } => Matcher::Contains(text.clone()),
            MatcherDef::ContainsAll { all } => Matcher::ContainsAll(all.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransformDef {
    Substitute {
        find: String,
        replace: String,
    },
    RewriteLine {
        text: String,
        #[serde(default = "default_preserve_indent")]
        preserve_indent: bool,
    },
    Insert {
        lines: Vec<String>,
        #[serde(default)]
        position: PositionDef,
    },
}

impl TransformDef {
    fn to_transform(&self) -> Transform {
        match self {
            TransformDef::Substitute { find, replace } => Transform::Substitute {
                find: find.clone(),
                replace: replace.clone(),
            },
            TransformDef::RewriteLine {
                text,
                preserve_indent,
            } => Transform::RewriteLine {
                text: text.clone(),
                preserve_indent: *preserve_indent,
            },
            TransformDef::Insert { lines, position } => Transform::Insert {
                lines: lines.clone(),
                position: match position {
                    PositionDef::Before => AnchorPosition::Before,
                    PositionDef::After => AnchorPosition::After,
                },
            },
        }
    }
}

fn default_preserve_indent() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PositionDef {
    Before,
    #[default]
    After,
}
