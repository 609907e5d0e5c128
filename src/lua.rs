//! Lexical helpers for working on Lua source text
//!
//! Nothing here builds a token stream. These are the small pieces every
//! rewrite pass needs: the keyword table, synthetic-name recognition,
//! whole-word patterns, and scanners that find where a block, a bracket or
//! an expression list ends.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;

use crate::error::Result;

/// Reserved words of Lua 5.x
pub const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// A synthetic identifier anywhere in the buffer (`var3`, `var3_1`)
pub static SYNTHETIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bvar\d+(?:_\d+)?\b").unwrap());

static SYNTHETIC_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^var\d+(?:_\d+)?$").unwrap());

/// `local a, b` name lists, targets only
static LOCAL_TARGETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blocal[ \t]+(\w+(?:[ \t]*,[ \t]*\w+)*)").unwrap());

/// `name =` (but not `name ==`)
static ASSIGN_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(var\d+(?:_\d+)?)[ \t]*=(?:[^=]|$)").unwrap());

/// `function name(` headers
static FUNCTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction[ \t]+(\w+)[ \t]*\(").unwrap());

pub fn is_keyword(word: &str) -> bool {
    LUA_KEYWORDS.contains(&word)
}

pub fn is_synthetic(name: &str) -> bool {
    SYNTHETIC_EXACT.is_match(name)
}

/// Build a pattern matching `name` as a whole word
pub fn word_pattern(name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(r"\b{}\b", regex::escape(name)))?)
}

/// Check whether `line` contains `word` as a standalone token
pub fn contains_word(line: &str, word: &str) -> bool {
    line.match_indices(word).any(|(idx, _)| {
        let before = line[..idx].chars().next_back();
        let after = line[idx + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split a short string literal (`"..."` or `'...'`) into its quote
/// character and raw contents
pub fn unquote(literal: &str) -> Option<(char, &str)> {
    let literal = literal.trim();
    let quote = literal.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if literal.len() < 2 || !literal.ends_with(quote) {
        return None;
    }
    Some((quote, &literal[1..literal.len() - 1]))
}

/// Render `content` as a Lua short string literal
pub fn quote(content: &str, quote: char) -> String {
    let mut out = String::with_capacity(content.len() + 2);
    out.push(quote);
    for c in content.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Read counts for synthetic names at one point in the pipeline.
///
/// A name is *read* when it occurs somewhere other than as a declaration
/// target (`local var1`, `var1 = ...`) or a function header
/// (`function var1(`). The index is a snapshot; passes rebuild it instead of
/// patching it after their own removals.
#[derive(Debug, Default, Clone)]
pub struct UsageIndex {
    occurrences: HashMap<String, usize>,
    definitions: HashMap<String, usize>,
}

impl UsageIndex {
    pub fn build(source: &str) -> Self {
        let mut occurrences = HashMap::new();
        for m in SYNTHETIC_NAME.find_iter(source) {
            *occurrences.entry(m.as_str().to_string()).or_insert(0) += 1;
        }

        let mut definitions: HashMap<String, usize> = HashMap::new();
        let mut local_spans = Vec::new();
        for caps in LOCAL_TARGETS.captures_iter(source) {
            let Some(list) = caps.get(1) else {
                continue;
            };
            local_spans.push(list.start()..list.end());
            for name in list.as_str().split(',').map(str::trim) {
                if is_synthetic(name) {
                    *definitions.entry(name.to_string()).or_insert(0) += 1;
                }
            }
        }
        for caps in ASSIGN_TARGET.captures_iter(source) {
            let Some(target) = caps.get(1) else {
                continue;
            };
            // Already counted as part of a `local` list
            if local_spans.iter().any(|span| span.contains(&target.start())) {
                continue;
            }
            *definitions.entry(target.as_str().to_string()).or_insert(0) += 1;
        }
        for caps in FUNCTION_HEADER.captures_iter(source) {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if is_synthetic(name) {
                *definitions.entry(name.to_string()).or_insert(0) += 1;
            }
        }

        Self {
            occurrences,
            definitions,
        }
    }

    /// Total whole-word occurrences of `name`
    pub fn occurrences(&self, name: &str) -> usize {
        self.occurrences.get(name).copied().unwrap_or(0)
    }

    /// Occurrences of `name` that are not declaration targets
    pub fn reads(&self, name: &str) -> usize {
        let defs = self.definitions.get(name).copied().unwrap_or(0);
        self.occurrences(name).saturating_sub(defs)
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.reads(name) > 0
    }
}

/// Find the end of the block opened by the keyword at `start`.
///
/// `start` must point at an opener (`function`, `if`, `do`, `repeat`). The
/// returned offset is one past the matching `end`/`until`. String literals,
/// long strings and comments are skipped. Returns `None` for unbalanced
/// input.
pub fn block_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth: usize = 0;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_comment(bytes, i),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'[' => match long_bracket_end(bytes, i) {
                Some(close) => i = close,
                None => i += 1,
            },
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let word_start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                match &source[word_start..i] {
                    "function" | "if" | "do" | "repeat" => depth += 1,
                    "end" | "until" => {
                        depth = depth.checked_sub(1)?;
                        if depth == 0 {
                            return Some(i);
                        }
                    }
                    _ => {}
                }
            }
            _ => i += 1,
        }
    }

    None
}

/// Find the `)`, `]` or `}` closing the bracket that opens at `open`.
///
/// Returns the offset of the closing bracket. Strings, long strings and
/// comments are skipped.
pub fn closing_bracket(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if !matches!(bytes.get(open), Some(b'(' | b'[' | b'{')) {
        return None;
    }
    let mut depth: usize = 0;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_comment(bytes, i),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'[' if i != open && long_bracket_end(bytes, i).is_some() => {
                i = long_bracket_end(bytes, i)?;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    None
}

/// Top-level expressions of the list that starts at `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionList {
    /// Trimmed span of each comma-separated expression
    pub items: Vec<Range<usize>>,
    /// One past the last byte of the last expression
    pub end: usize,
}

/// Scan the right-hand side of an assignment starting at `start`.
///
/// The list ends at a `;`, at a bracket it did not open, at a line break or
/// comment after a complete operand, or at the first word that can only
/// begin the next statement. `local a = 1 local b = 2` ends after `1`.
pub fn expression_list(source: &str, start: usize) -> ExpressionList {
    let bytes = source.as_bytes();
    let mut items = Vec::new();
    let mut item_start: Option<usize> = None;
    let mut last_end = start;
    let mut depth: usize = 0;
    let mut expect_operand = true;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        let token_start = i;
        match b {
            b' ' | b'\t' | b'\r' => {
                i += 1;
                continue;
            }
            b'\n' => {
                if depth == 0 && !expect_operand {
                    break;
                }
                i += 1;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                if depth == 0 && !expect_operand {
                    break;
                }
                i = skip_comment(bytes, i);
                continue;
            }
            b';' if depth == 0 => break,
            b',' if depth == 0 => {
                if let Some(item) = item_start.take() {
                    items.push(item..last_end);
                }
                expect_operand = true;
                i += 1;
                continue;
            }
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                expect_operand = false;
            }
            b'[' if long_bracket_end(bytes, i).is_some() => {
                i = long_bracket_end(bytes, i).unwrap_or(bytes.len());
                expect_operand = false;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                expect_operand = true;
                i += 1;
            }
            b')' | b']' | b'}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                expect_operand = false;
                i += 1;
            }
            b'.' if bytes.get(i + 1) == Some(&b'.') => {
                if bytes.get(i + 2) == Some(&b'.') {
                    i += 3;
                    expect_operand = false;
                } else {
                    i += 2;
                    expect_operand = true;
                }
            }
            b'0'..=b'9' | b'.' if expect_operand || depth > 0 => {
                i = skip_number(bytes, i);
                expect_operand = false;
            }
            b'0'..=b'9' => break,
            b'.' | b':' => {
                i += 1;
                expect_operand = true;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if depth == 0 {
                    let word = &source[token_start..i];
                    match word {
                        "and" | "or" | "not" => expect_operand = true,
                        "function" if expect_operand => {
                            i = block_end(source, token_start).unwrap_or(bytes.len());
                            expect_operand = false;
                        }
                        "nil" | "true" | "false" if expect_operand => expect_operand = false,
                        _ if is_keyword(word) || !expect_operand => {
                            i = token_start;
                            break;
                        }
                        _ => expect_operand = false,
                    }
                }
            }
            b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b'#' | b'&' | b'|' | b'~' | b'<'
            | b'>' | b'=' => {
                i += 1;
                expect_operand = true;
            }
            _ => {
                i += 1;
                while i < bytes.len() && !source.is_char_boundary(i) {
                    i += 1;
                }
            }
        }
        item_start.get_or_insert(token_start);
        last_end = i;
    }

    if let Some(item) = item_start {
        items.push(item..last_end);
    }
    let end = if items.is_empty() { start } else { last_end };
    ExpressionList { items, end }
}

/// Extend a statement ending at `end` over a trailing `;` and the blanks
/// around it, stopping before any line break
pub fn statement_end(source: &str, end: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = end;
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }
    if bytes.get(i) == Some(&b';') {
        i += 1;
        while matches!(bytes.get(i), Some(b' ' | b'\t')) {
            i += 1;
        }
    }
    i
}

/// Whether an assignment target at `start` begins a statement, as opposed
/// to a field (`t.x =`), a table key (`{x =`) or a later list target
/// (`a, x =`)
pub fn starts_statement(source: &str, start: usize) -> bool {
    let before = source[..start].trim_end_matches([' ', '\t']);
    !before.ends_with(['.', ':', ',', '{', '('])
}

/// Apply `(span, replacement)` edits to `source`.
///
/// Edits are applied in span order; one that overlaps an earlier edit is
/// dropped. Returns the new text and the number of edits applied.
pub fn apply_edits(source: &str, mut edits: Vec<(Range<usize>, String)>) -> (String, usize) {
    edits.sort_by_key(|(span, _)| span.start);

    let mut code = String::with_capacity(source.len());
    let mut last = 0;
    let mut applied = 0;
    for (span, replacement) in edits {
        if span.start < last {
            continue;
        }
        code.push_str(&source[last..span.start]);
        code.push_str(&replacement);
        last = span.end;
        applied += 1;
    }
    code.push_str(&source[last..]);
    (code, applied)
}

fn skip_comment(bytes: &[u8], i: usize) -> usize {
    let i = i + 2;
    if let Some(close) = long_bracket_end(bytes, i) {
        return close;
    }
    bytes[i.min(bytes.len())..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |pos| i + pos)
}

fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() && bytes[j] != quote {
        if bytes[j] == b'\\' {
            j += 1;
        }
        j += 1;
    }
    (j + 1).min(bytes.len())
}

fn skip_number(bytes: &[u8], i: usize) -> usize {
    let mut j = i;
    while j < bytes.len() {
        let b = bytes[j];
        let exponent_sign = (b == b'+' || b == b'-')
            && j > i
            && matches!(bytes[j - 1], b'e' | b'E' | b'p' | b'P')
            && !(bytes[i..j].starts_with(b"0x") && matches!(bytes[j - 1], b'e' | b'E'));
        if b.is_ascii_alphanumeric() || b == b'.' || exponent_sign {
            j += 1;
        } else {
            break;
        }
    }
    j
}

/// If a long bracket (`[[`, `[==[`) opens at `i`, return the offset just past
/// its closing bracket.
fn long_bracket_end(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes.get(i) != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'=') {
        level += 1;
        j += 1;
    }
    if bytes.get(j) != Some(&b'[') {
        return None;
    }
    j += 1;

    let mut close = Vec::with_capacity(level + 2);
    close.push(b']');
    close.extend(std::iter::repeat(b'=').take(level));
    close.push(b']');

    let rest = &bytes[j..];
    rest.windows(close.len())
        .position(|w| w == close.as_slice())
        .map(|pos| j + pos + close.len())
        .or(Some(bytes.len()))
}
