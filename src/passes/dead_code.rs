//! Dead branch, loop, call and function removal
//!
//! Four fixed shapes are deleted in a single pass each. Nothing is revisited:
//! dead code nested inside a removed block is gone with it, and code that
//! becomes dead only after a removal stays.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

use super::{Pass, PassContext};
use crate::error::Result;
use crate::lua::{block_end, is_keyword, UsageIndex};

static EMPTY_IF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bif\s+(?:true|false)\s+then\s+end\b").unwrap());

/// `for i = 1, 10 do end` (optional step) and the obfuscator's `for (1, 10) do end`
static EMPTY_FOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bfor\s+(?:\w+\s*=\s*-?\d+\s*,\s*-?\d+(?:\s*,\s*-?\d+)?|\(\s*-?\d+\s*,\s*-?\d+\s*\))\s+do\s+end\b",
    )
    .unwrap()
});

static EMPTY_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\s+(\w+)\s*\(\s*\)\s*end\b").unwrap());

static SYNTHETIC_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\blocal[ \t]+)?\bfunction[ \t]+(var\d+(?:_\d+)?)[ \t]*\(").unwrap()
});

pub struct DeadCodePass;

impl Pass for DeadCodePass {
    fn name(&self) -> &'static str {
        "dead_code"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let (code, a) = remove_empty_ifs(source);
        let (code, b) = remove_empty_loops(&code);
        let (code, c) = remove_empty_function_calls(&code)?;
        let (code, d) = remove_unused_functions(&code);
        for _ in 0..a + b + c + d {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.remove_dead_code
    }
}

/// `if true then end` / `if false then end`
pub fn remove_empty_ifs(source: &str) -> (String, usize) {
    remove_all(&EMPTY_IF, source, "Removed useless if statement")
}

/// Empty numeric `for` loops over a literal range
pub fn remove_empty_loops(source: &str) -> (String, usize) {
    remove_all(&EMPTY_FOR, source, "Removed useless loop")
}

fn remove_all(pattern: &Regex, source: &str, message: &str) -> (String, usize) {
    let mut removed = 0;
    let code = pattern
        .replace_all(source, |caps: &Captures| {
            removed += 1;
            log::info!("{}: {}", message, &caps[0]);
            String::new()
        })
        .into_owned();
    (code, removed)
}

/// Delete statement calls to functions defined as `function f() end`.
///
/// Calls whose result is consumed (`x = f()`, `g(f())`, `obj.f()`) are kept.
pub fn remove_empty_function_calls(source: &str) -> Result<(String, usize)> {
    let mut names: Vec<&str> = EMPTY_FUNCTION
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();
    if names.is_empty() {
        return Ok((source.to_string(), 0));
    }

    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    let call = Regex::new(&format!(
        r"(\bfunction\s+)?\b(?:{})\s*\([^()\n]*\)",
        alternation
    ))?;

    let mut removed = 0;
    let code = call
        .replace_all(source, |caps: &Captures| {
            let whole = caps.get(0).unwrap();
            // The definition itself
            if caps.get(1).is_some() || !is_statement_start(&source[..whole.start()]) {
                return whole.as_str().to_string();
            }
            removed += 1;
            log::info!("Removed useless function call: {}", whole.as_str());
            String::new()
        })
        .into_owned();

    Ok((code, removed))
}

/// Whether a call starting right after `before` is a statement of its own
fn is_statement_start(before: &str) -> bool {
    let before = before.trim_end_matches([' ', '\t']);
    let Some(last) = before.chars().next_back() else {
        return true;
    };
    if last.is_alphanumeric() || last == '_' {
        let word_start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map_or(before.len(), |(i, _)| i);
        let word = &before[word_start..];
        // Only block keywords can directly precede a statement
        return !is_keyword(word) || matches!(word, "end" | "do" | "then" | "else" | "repeat");
    }
    matches!(last, '\n' | ';' | ')' | ']' | '}' | '"' | '\'')
}

/// Delete whole definitions of synthetic functions that are never read
pub fn remove_unused_functions(source: &str) -> (String, usize) {
    let usage = UsageIndex::build(source);

    let mut spans: Vec<(Range<usize>, &str)> = Vec::new();
    for caps in SYNTHETIC_FUNCTION.captures_iter(source) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if usage.is_used(name) {
            continue;
        }
        let header = caps.get(0).unwrap();
        let keyword = header.start() + header.as_str().find("function").unwrap_or(0);
        match block_end(source, keyword) {
            Some(end) => spans.push((header.start()..end, name)),
            None => log::warn!("Could not find the end of function {}", name),
        }
    }

    let mut code = String::with_capacity(source.len());
    let mut last = 0;
    let mut removed = 0;
    for (span, name) in spans {
        // Nested inside a definition that is already gone
        if span.start < last {
            continue;
        }
        code.push_str(&source[last..span.start]);
        last = span.end;
        removed += 1;
        log::info!("Removed useless function: {}", name);
    }
    code.push_str(&source[last..]);

    (code, removed)
}
