//! The declarative patch rule: one find/guard/replace unit.
//!
//! Rules carry no file I/O. A rule is evaluated against a unit of text (the
//! whole content or a single line, depending on [`Scope`]) and produces new
//! content plus a [`RuleStatus`]. All intelligence about *where* a change
//! lands lives here; the engine only folds rules over content and decides
//! whether to write.

use crate::report::RuleStatus;

/// The unit of text a rule's matcher and transform operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The matcher tests the entire file content; the transform rewrites it.
    WholeContent,
    /// The matcher is evaluated per line; each line is independently eligible.
    LineWise,
}

/// Literal-substring predicate over a unit of text.
///
/// Deliberately not a regex: the patched files are opaque text and every
/// target this tool was built for is a literal quoted string or call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// The unit contains this substring.
    Contains(String),
    /// The unit contains every one of these substrings.
    ContainsAll(Vec<String>),
}

impl Matcher {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Contains(needle) => text.contains(needle.as_str()),
            Matcher::ContainsAll(needles) => {
                needles.iter().all(|needle| text.contains(needle.as_str()))
            }
        }
    }
}

/// Where inserted lines land relative to the anchor line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPosition {
    Before,
    After,
}

/// Pure text transform applied to a matched unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Replace every occurrence of `find` with `replace` within the scoped
    /// unit (the full content, or each matching line).
    Substitute { find: String, replace: String },
    /// Replace the entire matched line. The original line's leading
    /// whitespace is re-applied unless `preserve_indent` is false.
    /// Only valid with [`Scope::LineWise`].
    RewriteLine { text: String, preserve_indent: bool },
    /// Splice `lines` adjacent to the first line the matcher accepts.
    /// Only valid with [`Scope::LineWise`].
    Insert {
        lines: Vec<String>,
        position: AnchorPosition,
    },
}

/// A single declarative unit of change.
///
/// `matcher` decides whether the rule's target is present; `guard` is the
/// idempotency marker that recognizes the rule's own output and short-
/// circuits re-application. A substitution rule may omit the matcher, in
/// which case containment of `find` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRule {
    /// Stable identifier for reporting.
    pub id: String,
    pub scope: Scope,
    pub matcher: Option<Matcher>,
    /// Already-patched marker; a hit is reported as `SkippedAlreadyPatched`.
    pub guard: Option<Matcher>,
    pub transform: Transform,
}

impl PatchRule {
    /// Whole-content substitution of every occurrence of `find`.
    pub fn substitute(
        id: impl Into<String>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope: Scope::WholeContent,
            matcher: None,
            guard: None,
            transform: Transform::Substitute {
                find: find.into(),
                replace: replace.into(),
            },
        }
    }

    /// Per-line substitution; every matching line is rewritten independently.
    pub fn substitute_lines(
        id: impl Into<String>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            scope: Scope::LineWise,
            ..Self::substitute(id, find, replace)
        }
    }

    /// Replace each matching line wholesale, keeping its indentation.
    pub fn rewrite_line(id: impl Into<String>, matcher: Matcher, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: Scope::LineWise,
            matcher: Some(matcher),
            guard: None,
            transform: Transform::RewriteLine {
                text: text.into(),
                preserve_indent: true,
            },
        }
    }

    /// Splice `lines` before or after the first line matching `anchor`.
    pub fn insert(
        id: impl Into<String>,
        anchor: Matcher,
        position: AnchorPosition,
        lines: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope: Scope::LineWise,
            matcher: Some(anchor),
            guard: None,
            transform: Transform::Insert { lines, position },
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_guard(mut self, guard: Matcher) -> Self {
        self.guard = Some(guard);
        self
    }

    /// The matcher actually used during evaluation: the explicit one, or
    /// containment of the substitution's `find` text.
    pub fn effective_matcher(&self) -> Option<Matcher> {
        if let Some(matcher) = &self.matcher {
            return Some(matcher.clone());
        }
        match &self.transform {
            Transform::Substitute { find, .. } if !find.is_empty() => {
                Some(Matcher::Contains(find.clone()))
            }
            _ => None,
        }
    }

    /// A representative needle for diagnostics (closest-line suggestions).
    pub fn target_hint(&self) -> Option<&str> {
        match &self.matcher {
            Some(Matcher::Contains(text)) => Some(text),
            Some(Matcher::ContainsAll(all)) => all.first().map(String::as_str),
            None => match &self.transform {
                Transform::Substitute { find, .. } => Some(find),
                _ => None,
            },
        }
    }
}

/// Evaluate one rule against content.
///
/// Returns the new content (None when nothing changed) and the rule's
/// reported status. Never fails: a rule whose target is absent is an
/// ordinary `NotFound`, not an error.
pub(crate) fn apply_rule(rule: &PatchRule, content: &str) -> (Option<String>, RuleStatus) {
    match rule.scope {
        Scope::WholeContent => apply_whole_content(rule, content),
        Scope::LineWise => apply_line_wise(rule, content),
    }
}

fn apply_whole_content(rule: &PatchRule, content: &str) -> (Option<String>, RuleStatus) {
    if rule.guard.as_ref().is_some_and(|g| g.matches(content)) {
        return (None, RuleStatus::SkippedAlreadyPatched);
    }
    let Some(matcher) = rule.effective_matcher() else {
        return (None, RuleStatus::NotFound);
    };
    if !matcher.matches(content) {
        return (None, RuleStatus::NotFound);
    }
    match &rule.transform {
        Transform::Substitute { find, replace } => {
            let out = content.replace(find.as_str(), replace);
            if out == content {
                (None, RuleStatus::NotFound)
            } else {
                (Some(out), RuleStatus::Applied)
            }
        }
        // Plan validation rejects line transforms at whole-content scope.
        Transform::RewriteLine { .. } | Transform::Insert { .. } => (None, RuleStatus::NotFound),
    }
}

fn apply_line_wise(rule: &PatchRule, content: &str) -> (Option<String>, RuleStatus) {
    if let Transform::Insert { lines, position } = &rule.transform {
        return apply_insert(rule, content, lines, *position);
    }

    let Some(matcher) = rule.effective_matcher() else {
        return (None, RuleStatus::NotFound);
    };

    let mut out = String::with_capacity(content.len());
    let mut changed = false;
    let mut guarded = false;

    for piece in content.split_inclusive('\n') {
        let (body, terminator) = split_line(piece);

        // The guard wins over the matcher: a line that already carries the
        // patched form is skipped for this rule.
        if rule.guard.as_ref().is_some_and(|g| g.matches(body)) {
            guarded = true;
            out.push_str(piece);
            continue;
        }
        if !matcher.matches(body) {
            out.push_str(piece);
            continue;
        }

        let new_body = match &rule.transform {
            Transform::Substitute { find, replace } => body.replace(find.as_str(), replace),
            Transform::RewriteLine {
                text,
                preserve_indent,
            } => {
                if *preserve_indent {
                    format!("{}{}", leading_whitespace(body), text)
                } else {
                    text.clone()
                }
            }
            Transform::Insert { .. } => body.to_string(),
        };

        if new_body != body {
            changed = true;
        }
        out.push_str(&new_body);
        out.push_str(terminator);
    }

    if changed {
        (Some(out), RuleStatus::Applied)
    } else if guarded {
        (None, RuleStatus::SkippedAlreadyPatched)
    } else {
        (None, RuleStatus::NotFound)
    }
}

/// Anchored insertion. First-match policy: when the anchor pattern matches
/// more than one line, only the first occurrence (in document order)
/// receives the insertion.
fn apply_insert(
    rule: &PatchRule,
    content: &str,
    payload: &[String],
    position: AnchorPosition,
) -> (Option<String>, RuleStatus) {
    let Some(matcher) = rule.effective_matcher() else {
        return (None, RuleStatus::NotFound);
    };

    let pieces: Vec<&str> = content.split_inclusive('\n').collect();
    let Some(anchor) = pieces
        .iter()
        .position(|piece| matcher.matches(line_body(piece)))
    else {
        return (None, RuleStatus::NotFound);
    };

    // The re-insertion guard is scoped to the insertion site, not the whole
    // file: a guard hit in an unrelated region must not suppress this anchor.
    if let Some(guard) = &rule.guard {
        let window = insertion_window(&pieces, anchor, payload.len(), position);
        if window.iter().any(|body| guard.matches(body)) {
            return (None, RuleStatus::SkippedAlreadyPatched);
        }
    }
    if payload_already_adjacent(&pieces, anchor, payload, position) {
        return (None, RuleStatus::SkippedAlreadyPatched);
    }

    let terminator = match line_terminator(pieces[anchor]) {
        "" => dominant_terminator(content),
        t => t,
    };

    let extra: usize = payload.iter().map(|l| l.len() + terminator.len()).sum();
    let mut out = String::with_capacity(content.len() + extra);
    match position {
        AnchorPosition::Before => {
            for piece in &pieces[..anchor] {
                out.push_str(piece);
            }
            for line in payload {
                out.push_str(line);
                out.push_str(terminator);
            }
            for piece in &pieces[anchor..] {
                out.push_str(piece);
            }
        }
        AnchorPosition::After => {
            for piece in &pieces[..=anchor] {
                out.push_str(piece);
            }
            let anchor_unterminated = line_terminator(pieces[anchor]).is_empty();
            if anchor_unterminated {
                out.push_str(terminator);
            }
            for (idx, line) in payload.iter().enumerate() {
                out.push_str(line);
                let last = idx + 1 == payload.len();
                // an unterminated anchor is the final line; keep the file's
                // missing trailing newline
                if !(last && anchor_unterminated) {
                    out.push_str(terminator);
                }
            }
            for piece in &pieces[anchor + 1..] {
                out.push_str(piece);
            }
        }
    }
    (Some(out), RuleStatus::Applied)
}

/// The anchor line plus the adjacent span the payload would occupy.
fn insertion_window<'a>(
    pieces: &[&'a str],
    anchor: usize,
    span: usize,
    position: AnchorPosition,
) -> Vec<&'a str> {
    let mut window = vec![line_body(pieces[anchor])];
    match position {
        AnchorPosition::Before => {
            let start = anchor.saturating_sub(span);
            window.extend(pieces[start..anchor].iter().map(|p| line_body(p)));
        }
        AnchorPosition::After => {
            let end = (anchor + 1 + span).min(pieces.len());
            window.extend(pieces[anchor + 1..end].iter().map(|p| line_body(p)));
        }
    }
    window
}

/// Natural idempotency for insertions without a guard: the payload already
/// sits exactly adjacent to the anchor.
fn payload_already_adjacent(
    pieces: &[&str],
    anchor: usize,
    payload: &[String],
    position: AnchorPosition,
) -> bool {
    if payload.is_empty() {
        return false;
    }
    match position {
        AnchorPosition::Before => {
            anchor >= payload.len()
                && pieces[anchor - payload.len()..anchor]
                    .iter()
                    .zip(payload)
                    .all(|(piece, line)| line_body(piece) == line.as_str())
        }
        AnchorPosition::After => {
            anchor + 1 + payload.len() <= pieces.len()
                && pieces[anchor + 1..anchor + 1 + payload.len()]
                    .iter()
                    .zip(payload)
                    .all(|(piece, line)| line_body(piece) == line.as_str())
        }
    }
}

/// Split one `split_inclusive('\n')` piece into (body, terminator),
/// keeping the original line-ending style intact.
fn split_line(piece: &str) -> (&str, &str) {
    if let Some(body) = piece.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = piece.strip_suffix('\n') {
        (body, "\n")
    } else {
        (piece, "")
    }
}

fn line_body(piece: &str) -> &str {
    split_line(piece).0
}

fn line_terminator(piece: &str) -> &str {
    split_line(piece).1
}

fn dominant_terminator(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn leading_whitespace(body: &str) -> &str {
    &body[..body.len() - body.trim_start().len()]
}
