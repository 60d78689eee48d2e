//! Closed set of violation kinds the engine knows how to correct.
//!
//! Codes follow pycodestyle/pyflakes numbering. Anything outside this set is
//! carried through the pipeline untouched and reported as skipped.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// A recognized lint rule with a deterministic textual fix.
pub enum ViolationKind {
    /// W291: trailing whitespace on a content line.
    TrailingWhitespace,
    /// W293: blank line containing only whitespace.
    WhitespaceBlankLine,
    /// W292: no newline at end of file.
    MissingFinalNewline,
    /// W391: blank line(s) at end of file.
    TrailingBlankLines,
    /// E301: expected one blank line before a method.
    MissingBlankLineBeforeMethod,
    /// E302: expected two blank lines before a top-level definition.
    MissingBlankLinesBeforeDefinition,
    /// E303: too many consecutive blank lines.
    ExcessBlankLines,
    /// E305: expected blank line after a definition block.
    MissingBlankLineAfterDefinition,
    /// E261: inline comment marker glued to code.
    InlineCommentSpacing,
    /// E265: block comment should start with `# `.
    BlockCommentSpacing,
    /// F401: imported but unused.
    UnusedImport,
    /// E501: line too long.
    OverlongLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// How a fix moves lines around relative to the line it targets.
///
/// Used to order fixes that share a line number: content edits first, then
/// edits that grow the file at or after the line, then edits that shift the
/// line itself.
pub enum LineEffect {
    InPlace,
    AtOrAfter,
    BeforeOrDelete,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 12] = [
        ViolationKind::TrailingWhitespace,
        ViolationKind::WhitespaceBlankLine,
        ViolationKind::MissingFinalNewline,
        ViolationKind::TrailingBlankLines,
        ViolationKind::MissingBlankLineBeforeMethod,
        ViolationKind::MissingBlankLinesBeforeDefinition,
        ViolationKind::ExcessBlankLines,
        ViolationKind::MissingBlankLineAfterDefinition,
        ViolationKind::InlineCommentSpacing,
        ViolationKind::BlockCommentSpacing,
        ViolationKind::UnusedImport,
        ViolationKind::OverlongLine,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ViolationKind::TrailingWhitespace => "W291",
            ViolationKind::WhitespaceBlankLine => "W293",
            ViolationKind::MissingFinalNewline => "W292",
            ViolationKind::TrailingBlankLines => "W391",
            ViolationKind::MissingBlankLineBeforeMethod => "E301",
            ViolationKind::MissingBlankLinesBeforeDefinition => "E302",
            ViolationKind::ExcessBlankLines => "E303",
            ViolationKind::MissingBlankLineAfterDefinition => "E305",
            ViolationKind::InlineCommentSpacing => "E261",
            ViolationKind::BlockCommentSpacing => "E265",
            ViolationKind::UnusedImport => "F401",
            ViolationKind::OverlongLine => "E501",
        }
    }

    /// Map a linter code onto a known kind. Matching is case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.code().eq_ignore_ascii_case(code))
    }

    pub fn describe(self) -> &'static str {
        match self {
            ViolationKind::TrailingWhitespace => "trailing whitespace",
            ViolationKind::WhitespaceBlankLine => "whitespace-only blank line",
            ViolationKind::MissingFinalNewline => "missing final newline",
            ViolationKind::TrailingBlankLines => "blank lines at end of file",
            ViolationKind::MissingBlankLineBeforeMethod => "missing blank line before method",
            ViolationKind::MissingBlankLinesBeforeDefinition => {
                "missing blank lines before definition"
            }
            ViolationKind::ExcessBlankLines => "too many blank lines",
            ViolationKind::MissingBlankLineAfterDefinition => {
                "missing blank line after definition block"
            }
            ViolationKind::InlineCommentSpacing => "inline comment missing leading space",
            ViolationKind::BlockCommentSpacing => "block comment missing space",
            ViolationKind::UnusedImport => "unused import",
            ViolationKind::OverlongLine => "line too long",
        }
    }

    pub fn line_effect(self) -> LineEffect {
        match self {
            ViolationKind::TrailingWhitespace
            | ViolationKind::WhitespaceBlankLine
            | ViolationKind::MissingFinalNewline
            | ViolationKind::InlineCommentSpacing
            | ViolationKind::BlockCommentSpacing
            | ViolationKind::UnusedImport => LineEffect::InPlace,
            ViolationKind::OverlongLine | ViolationKind::MissingBlankLineAfterDefinition => {
                LineEffect::AtOrAfter
            }
            ViolationKind::TrailingBlankLines
            | ViolationKind::MissingBlankLineBeforeMethod
            | ViolationKind::MissingBlankLinesBeforeDefinition
            | ViolationKind::ExcessBlankLines => LineEffect::BeforeOrDelete,
        }
    }

    /// Built-in correction templates; the first entry is the default.
    pub fn templates(self) -> &'static [&'static str] {
        match self {
            ViolationKind::TrailingWhitespace => &["strip-trailing-whitespace"],
            ViolationKind::WhitespaceBlankLine => &["clear-blank-line"],
            ViolationKind::MissingFinalNewline => &["append-final-newline"],
            ViolationKind::TrailingBlankLines => &["drop-trailing-blank-lines"],
            ViolationKind::MissingBlankLineBeforeMethod => &["insert-blank-line-before"],
            ViolationKind::MissingBlankLinesBeforeDefinition => &["pad-blank-lines-before-def"],
            ViolationKind::ExcessBlankLines => &["collapse-blank-run"],
            ViolationKind::MissingBlankLineAfterDefinition => &["insert-blank-line-after"],
            ViolationKind::InlineCommentSpacing => &["space-before-inline-comment"],
            ViolationKind::BlockCommentSpacing => &["space-after-comment-marker"],
            ViolationKind::UnusedImport => &["comment-out-import"],
            ViolationKind::OverlongLine => &[SPLIT_STRING_LITERAL, WRAP_FROM_IMPORT],
        }
    }
}

pub const SPLIT_STRING_LITERAL: &str = "split-string-literal";
pub const WRAP_FROM_IMPORT: &str = "wrap-from-import";

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
