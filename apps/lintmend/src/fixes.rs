//! Fix dispatch table.
//!
//! One function per `ViolationKind`, selected by an exhaustive `match` in
//! `apply_fix`. Every function takes the mutable buffer and the 1-based line
//! the violation was reported on, and either mutates the buffer and returns
//! `Applied`, or returns a `FixError` without touching the buffer.
//!
//! Blank-line counting rules:
//! - E302 counts only truly empty lines as existing spacing. Whitespace-only
//!   lines carry their own kind (W293) and are normalised separately.
//! - E303/E305/W391 use the pycodestyle notion of blank (whitespace only).

use crate::buffer::{Line, LineBuffer, LineEnding};
use crate::error::FixError;
use crate::models::kind::{ViolationKind, SPLIT_STRING_LITERAL, WRAP_FROM_IMPORT};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Modules whose import has no observable side effect.
pub const DEFAULT_SAFE_IMPORTS: [&str; 8] = [
    "os",
    "sys",
    "re",
    "json",
    "datetime",
    "pathlib",
    "typing",
    "collections",
];

#[derive(Debug, Clone)]
/// Tunables shared by every dispatch function.
pub struct FixOptions {
    /// Blank lines required before a top-level definition (E302).
    pub blank_lines_before_def: usize,
    /// Longest blank run left in place (E303).
    pub max_blank_lines: usize,
    /// Minimum literal width, in characters, worth splitting (E501).
    pub min_split_width: usize,
    /// Allow-list for conservative unused-import handling (F401).
    pub safe_imports: BTreeSet<String>,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            blank_lines_before_def: 2,
            max_blank_lines: 2,
            min_split_width: 40,
            safe_imports: DEFAULT_SAFE_IMPORTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Rendered text of the affected region before and after a fix.
pub struct Applied {
    pub original: String,
    pub resulting: String,
    /// Lines directly above the reported line that the fix rewrote or
    /// removed. Violations reported on them are no longer addressable.
    pub absorbed_above: usize,
}

/// Apply the fix for `kind` at `line` using `template`.
///
/// `template` only selects behavior for kinds with several templates
/// (currently E501); other kinds have a single transformation.
pub fn apply_fix(
    kind: ViolationKind,
    template: &str,
    buffer: &mut LineBuffer,
    line: usize,
    opts: &FixOptions,
) -> Result<Applied, FixError> {
    match kind {
        ViolationKind::TrailingWhitespace => strip_trailing_whitespace(buffer, line),
        ViolationKind::WhitespaceBlankLine => clear_blank_line(buffer, line),
        ViolationKind::MissingFinalNewline => append_final_newline(buffer),
        ViolationKind::TrailingBlankLines => drop_trailing_blank_lines(buffer, line),
        ViolationKind::MissingBlankLineBeforeMethod => insert_blank_line_before(buffer, line),
        ViolationKind::MissingBlankLinesBeforeDefinition => {
            pad_blank_lines_before_def(buffer, line, opts.blank_lines_before_def)
        }
        ViolationKind::ExcessBlankLines => collapse_blank_run(buffer, line, opts.max_blank_lines),
        ViolationKind::MissingBlankLineAfterDefinition => insert_blank_line_after(buffer, line),
        ViolationKind::InlineCommentSpacing => space_before_inline_comment(buffer, line),
        ViolationKind::BlockCommentSpacing => space_after_comment_marker(buffer, line),
        ViolationKind::UnusedImport => comment_out_import(buffer, line, &opts.safe_imports),
        ViolationKind::OverlongLine => match template {
            SPLIT_STRING_LITERAL => split_string_literal(buffer, line, opts.min_split_width),
            WRAP_FROM_IMPORT => wrap_from_import(buffer, line),
            other => Err(FixError::UnknownTemplate {
                code: kind.code(),
                template: other.to_string(),
            }),
        },
    }
}

fn strip_trailing_whitespace(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let current = buffer.line(idx);
    let stripped = current.text.trim_end();
    if stripped.len() == current.text.len() {
        return Err(FixError::AlreadySatisfied("no trailing whitespace".into()));
    }
    let stripped = stripped.to_string();
    let original = current.render();
    buffer.line_mut(idx).text = stripped;
    Ok(Applied {
        original,
        resulting: buffer.line(idx).render(),
        absorbed_above: 0,
    })
}

fn clear_blank_line(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let current = buffer.line(idx);
    if !current.is_blank() {
        return Err(FixError::PreconditionNotMet("line is not blank".into()));
    }
    if current.text.is_empty() {
        return Err(FixError::AlreadySatisfied("line is already empty".into()));
    }
    let original = current.render();
    buffer.line_mut(idx).text.clear();
    Ok(Applied {
        original,
        resulting: buffer.line(idx).render(),
        absorbed_above: 0,
    })
}

fn append_final_newline(buffer: &mut LineBuffer) -> Result<Applied, FixError> {
    let newline = buffer.newline();
    let Some(last) = buffer.last_mut() else {
        return Err(FixError::InsufficientContext("file is empty".into()));
    };
    if last.ending != LineEnding::None {
        return Err(FixError::AlreadySatisfied(
            "file already ends with a newline".into(),
        ));
    }
    let original = last.render();
    last.ending = newline;
    Ok(Applied {
        original,
        resulting: last.render(),
        absorbed_above: 0,
    })
}

fn drop_trailing_blank_lines(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let len = buffer.len();
    let trailing = buffer
        .lines()
        .iter()
        .rev()
        .take_while(|l| l.is_blank())
        .count();
    if trailing == 0 {
        return Err(FixError::AlreadySatisfied(
            "no blank lines at end of file".into(),
        ));
    }
    if trailing == len {
        return Err(FixError::PreconditionNotMet(
            "file has no content lines".into(),
        ));
    }
    let start = len - trailing;
    let original = buffer.render_range(start - 1, trailing + 1);
    buffer.remove_range(start, len);
    Ok(Applied {
        original,
        resulting: buffer.render_range(start - 1, 1),
        absorbed_above: line.saturating_sub(1).min(len).saturating_sub(start),
    })
}

fn insert_blank_line_before(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    if idx == 0 {
        return Err(FixError::InsufficientContext(
            "line is at the start of the file".into(),
        ));
    }
    if buffer.line(idx - 1).is_blank() {
        return Err(FixError::AlreadySatisfied(
            "a blank line already precedes the line".into(),
        ));
    }
    let original = buffer.line(idx).render();
    buffer.insert_empty(idx, 1);
    Ok(Applied {
        original,
        resulting: buffer.render_range(idx, 2),
        absorbed_above: 0,
    })
}

fn pad_blank_lines_before_def(
    buffer: &mut LineBuffer,
    line: usize,
    target: usize,
) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    if !is_definition(&buffer.line(idx).text) {
        return Err(FixError::PreconditionNotMet(
            "line is not a def/class definition or decorator".into(),
        ));
    }
    if idx == 0 {
        return Err(FixError::InsufficientContext(
            "definition is on the first line".into(),
        ));
    }
    let existing = buffer.lines()[..idx]
        .iter()
        .rev()
        .take_while(|l| l.text.is_empty())
        .count();
    if existing >= target {
        return Err(FixError::AlreadySatisfied(format!(
            "{existing} blank lines already precede the definition"
        )));
    }
    if existing == idx {
        return Err(FixError::InsufficientContext(
            "no content precedes the definition".into(),
        ));
    }
    if existing == 0 && buffer.line(idx - 1).text.trim_start().starts_with('@') {
        return Err(FixError::PreconditionNotMet(
            "definition is decorated; spacing belongs before the decorator".into(),
        ));
    }
    let missing = target - existing;
    let original = buffer.line(idx).render();
    buffer.insert_empty(idx, missing);
    Ok(Applied {
        original,
        resulting: buffer.render_range(idx, missing + 1),
        absorbed_above: 0,
    })
}

fn collapse_blank_run(
    buffer: &mut LineBuffer,
    line: usize,
    max_blank: usize,
) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let lines = buffer.lines();
    let mut start = idx;
    while start > 0 && lines[start - 1].is_blank() {
        start -= 1;
    }
    // pycodestyle reports E303 on the first line after the run
    let end = if lines[idx].is_blank() {
        let mut end = idx + 1;
        while end < lines.len() && lines[end].is_blank() {
            end += 1;
        }
        end
    } else {
        if start == idx {
            return Err(FixError::PreconditionNotMet(
                "no blank run at or directly above the line".into(),
            ));
        }
        idx
    };
    let run = end - start;
    if run <= max_blank {
        return Err(FixError::AlreadySatisfied(format!(
            "blank run of {run} does not exceed {max_blank}"
        )));
    }
    let excess = run - max_blank;
    let original = buffer.render_range(start, run);
    buffer.remove_range(start, start + excess);
    // kept lines end up empty, so a W293 inside the run is settled too
    for i in start..start + max_blank {
        buffer.line_mut(i).text.clear();
    }
    Ok(Applied {
        original,
        resulting: buffer.render_range(start, max_blank),
        absorbed_above: idx - start,
    })
}

fn insert_blank_line_after(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    if idx == 0 {
        return Err(FixError::InsufficientContext(
            "no previous line to close a definition".into(),
        ));
    }
    if idx + 1 >= buffer.len() {
        return Err(FixError::InsufficientContext(
            "line is the last line of the file".into(),
        ));
    }
    if !ends_definition(&buffer.line(idx - 1).text) {
        return Err(FixError::PreconditionNotMet(
            "previous line does not end a definition".into(),
        ));
    }
    if buffer.line(idx + 1).is_blank() {
        return Err(FixError::AlreadySatisfied(
            "a blank line already follows the line".into(),
        ));
    }
    let original = buffer.line(idx).render();
    buffer.insert_empty(idx + 1, 1);
    Ok(Applied {
        original,
        resulting: buffer.render_range(idx, 2),
        absorbed_above: 0,
    })
}

fn space_before_inline_comment(
    buffer: &mut LineBuffer,
    line: usize,
) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let text = &buffer.line(idx).text;
    let Some(pos) = find_comment_start(text) else {
        return Err(FixError::PreconditionNotMet(
            "no comment marker on the line".into(),
        ));
    };
    let code = &text[..pos];
    if code.trim().is_empty() {
        return Err(FixError::PreconditionNotMet("comment is not inline".into()));
    }
    if code.ends_with(char::is_whitespace) {
        return Err(FixError::AlreadySatisfied(
            "comment marker is already preceded by a space".into(),
        ));
    }
    let original = buffer.line(idx).render();
    buffer.line_mut(idx).text.insert(pos, ' ');
    Ok(Applied {
        original,
        resulting: buffer.line(idx).render(),
        absorbed_above: 0,
    })
}

fn space_after_comment_marker(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let text = &buffer.line(idx).text;
    let body = text.trim_start();
    if !body.starts_with('#') {
        return Err(FixError::PreconditionNotMet(
            "line is not a block comment".into(),
        ));
    }
    let indent = text.len() - body.len();
    let rest = body.trim_start_matches('#');
    let hashes = body.len() - rest.len();
    let shebang = line == 1 && rest.starts_with('!');
    if rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with(':') || shebang
    {
        return Err(FixError::AlreadySatisfied(
            "comment marker is already followed by a space".into(),
        ));
    }
    let original = buffer.line(idx).render();
    buffer.line_mut(idx).text.insert(indent + hashes, ' ');
    Ok(Applied {
        original,
        resulting: buffer.line(idx).render(),
        absorbed_above: 0,
    })
}

fn comment_out_import(
    buffer: &mut LineBuffer,
    line: usize,
    safe_imports: &BTreeSet<String>,
) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let text = &buffer.line(idx).text;
    let body = text.trim_start();
    if body.starts_with('#') {
        return Err(FixError::AlreadySatisfied(
            "import is already commented out".into(),
        ));
    }
    let module = imported_module(body).ok_or_else(|| {
        FixError::PreconditionNotMet("not a single-name import statement".into())
    })?;
    if body.len() != text.len() {
        return Err(FixError::NotAllowed(
            "import is nested inside a block".into(),
        ));
    }
    if !safe_imports.contains(module) {
        return Err(FixError::NotAllowed(format!(
            "module '{module}' is not on the side-effect-free allow-list"
        )));
    }
    let commented = format!("# {text}");
    let original = buffer.line(idx).render();
    buffer.line_mut(idx).text = commented;
    Ok(Applied {
        original,
        resulting: buffer.line(idx).render(),
        absorbed_above: 0,
    })
}

fn split_string_literal(
    buffer: &mut LineBuffer,
    line: usize,
    min_width: usize,
) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let current = buffer.line(idx).clone();
    let text = &current.text;
    let literal = widest_plain_literal(text)
        .filter(|lit| lit.width >= min_width)
        .ok_or_else(|| {
            FixError::NeedsManualFix(format!(
                "no plain string literal of at least {min_width} characters to split"
            ))
        })?;
    let q = literal.quote;
    let content = &text[literal.start + q.len_utf8()..literal.end - q.len_utf8()];
    let split = split_point(content)
        .ok_or_else(|| FixError::NeedsManualFix("literal too short to split".into()))?;
    let before = &text[..literal.start];
    let after = &text[literal.end..];
    let pad = " ".repeat(before.chars().count());
    let head = format!("{before}{q}{}{q} \\", &content[..split]);
    let tail = format!("{pad}{q}{}{q}{after}", &content[split..]);
    let original = current.render();
    let newline = buffer.newline();
    buffer.splice(
        idx,
        vec![Line::new(head, newline), Line::new(tail, current.ending)],
    );
    Ok(Applied {
        original,
        resulting: buffer.render_range(idx, 2),
        absorbed_above: 0,
    })
}

fn wrap_from_import(buffer: &mut LineBuffer, line: usize) -> Result<Applied, FixError> {
    let idx = buffer.index_of(line)?;
    let current = buffer.line(idx).clone();
    let caps = from_import_re().captures(&current.text).ok_or_else(|| {
        FixError::PreconditionNotMet("not a single-line from-import".into())
    })?;
    let indent = caps.name("indent").map_or("", |m| m.as_str());
    let module = &caps["module"];
    let names_src = &caps["names"];
    if names_src.contains('(') || names_src.contains('#') || names_src.ends_with('\\') {
        return Err(FixError::PreconditionNotMet(
            "import is already wrapped or carries a comment".into(),
        ));
    }
    let names: Vec<&str> = names_src
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    if names.len() < 2 {
        return Err(FixError::NeedsManualFix(
            "a single imported name cannot be wrapped".into(),
        ));
    }
    let newline = buffer.newline();
    let mut wrapped = Vec::with_capacity(names.len() + 2);
    wrapped.push(Line::new(format!("{indent}from {module} import ("), newline));
    for name in &names {
        wrapped.push(Line::new(format!("{indent}    {name},"), newline));
    }
    wrapped.push(Line::new(format!("{indent})"), current.ending));
    let count = wrapped.len();
    let original = current.render();
    buffer.splice(idx, wrapped);
    Ok(Applied {
        original,
        resulting: buffer.render_range(idx, count),
        absorbed_above: 0,
    })
}

fn from_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>[ \t]*)from\s+(?P<module>[\w.]+)\s+import\s+(?P<names>.+?)\s*$")
            .expect("from-import regex is valid")
    })
}

fn is_definition(text: &str) -> bool {
    let t = text.trim_start();
    t.starts_with("def ")
        || t.starts_with("class ")
        || t.starts_with("async def ")
        || t.starts_with('@')
}

/// A definition header or an indented body line closes a definition block.
fn ends_definition(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let header = is_definition(text) && text.trim_end().ends_with(':');
    header || text.starts_with([' ', '\t'])
}

/// Byte offset of the first `#` outside a string literal.
fn find_comment_start(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '#' => return Some(i),
                '"' | '\'' => quote = Some(ch),
                _ => {}
            },
        }
    }
    None
}

/// Top-level module of a single-name `import x` / `from x import y` line.
fn imported_module(stmt: &str) -> Option<&str> {
    let stmt = match find_comment_start(stmt) {
        Some(pos) => &stmt[..pos],
        None => stmt,
    }
    .trim_end();
    if stmt.ends_with('\\') || stmt.contains(['(', ',', ';']) {
        return None;
    }
    let mut words = stmt.split_whitespace();
    let module = match words.next()? {
        "import" => words.next()?,
        "from" => {
            let module = words.next()?;
            if module.starts_with('.') || words.next()? != "import" {
                return None;
            }
            if words.next()? == "*" {
                return None;
            }
            module
        }
        _ => return None,
    };
    match (words.next(), words.next(), words.next()) {
        (None, _, _) | (Some("as"), Some(_), None) => module.split('.').next(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Literal {
    /// Byte offset of the opening quote.
    start: usize,
    /// Byte offset just past the closing quote.
    end: usize,
    /// Content width in characters.
    width: usize,
    quote: char,
}

/// Widest unprefixed, escape-free, single-line string literal before any
/// comment. Lines holding triple-quoted or unterminated strings yield `None`.
fn widest_plain_literal(text: &str) -> Option<Literal> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut best: Option<Literal> = None;
    let mut i = 0;
    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            '#' => break,
            '"' | '\'' => {
                let triple = chars.get(i + 1).map(|c| c.1) == Some(ch)
                    && chars.get(i + 2).map(|c| c.1) == Some(ch);
                if triple {
                    return None;
                }
                let prefixed = i > 0 && (chars[i - 1].1.is_alphanumeric() || chars[i - 1].1 == '_');
                let mut j = i + 1;
                let mut escaped = false;
                let mut has_escape = false;
                while j < chars.len() {
                    let c = chars[j].1;
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                        has_escape = true;
                    } else if c == ch {
                        break;
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return None;
                }
                let width = j - i - 1;
                if !prefixed && !has_escape && best.map_or(true, |b| width > b.width) {
                    best = Some(Literal {
                        start: pos,
                        end: chars[j].0 + ch.len_utf8(),
                        width,
                        quote: ch,
                    });
                }
                i = j + 1;
            }
            _ => i += 1,
        }
    }
    best
}

/// Byte offset to split literal content at: just after the space closest
/// to the middle, or the middle character when no space sits near it.
fn split_point(content: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = content.char_indices().collect();
    let n = chars.len();
    if n < 2 {
        return None;
    }
    let mid = n / 2;
    let near = (n / 4)..(n - n / 4);
    let by_space = chars
        .iter()
        .enumerate()
        .filter(|(k, (_, c))| *c == ' ' && near.contains(k) && k + 1 < n)
        .min_by_key(|(k, _)| k.abs_diff(mid))
        .map(|(k, _)| chars[k + 1].0);
    Some(by_space.unwrap_or(chars[mid].0)).filter(|&p| p > 0 && p < content.len())
}
