//! Late sweep for stores nobody reads
//!
//! Runs after the arithmetic and dead-code passes, when more assignments may
//! have lost their readers than at renaming time.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::ops::Range;

use super::{Pass, PassContext};
use crate::error::Result;
use crate::lua::{apply_edits, expression_list, starts_statement, statement_end, UsageIndex};

/// Head of `varN = ...`, with or without `local`
static SYNTHETIC_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\blocal[ \t]+)?\b(var\d+(?:_\d+)?)[ \t]*=").unwrap());

/// Head of `G.key = ...`
static TABLE_KEY_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(G\.\w+)[ \t]*=").unwrap());

pub struct UnusedStorePass;

impl Pass for UnusedStorePass {
    fn name(&self) -> &'static str {
        "unused_stores"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let (code, assignments) = remove_unused_assignments(source);
        let (code, keys) = remove_unused_table_keys(&code);
        for _ in 0..assignments + keys {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.remove_unused_stores
    }
}

/// Remove `varN = ...` when `varN` is never read
pub fn remove_unused_assignments(source: &str) -> (String, usize) {
    let usage = UsageIndex::build(source);
    remove_statements(
        source,
        &SYNTHETIC_ASSIGNMENT,
        |name| !usage.is_used(name),
        "Removed useless assignment",
    )
}

/// Remove `G.key = ...` when `G.key` appears nowhere else
pub fn remove_unused_table_keys(source: &str) -> (String, usize) {
    let mut seen = HashSet::new();
    let single_use: HashSet<String> = TABLE_KEY_ASSIGNMENT
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .filter(|key| seen.insert(key.clone()))
        .filter(|key| source.matches(key.as_str()).count() == 1)
        .collect();

    remove_statements(
        source,
        &TABLE_KEY_ASSIGNMENT,
        |key| single_use.contains(key),
        "Removed unused dictionary key",
    )
}

/// Delete each assignment statement whose head matches `head` and whose
/// target passes `remove`, up to the end of its right-hand side
fn remove_statements(
    source: &str,
    head: &Regex,
    remove: impl Fn(&str) -> bool,
    message: &str,
) -> (String, usize) {
    let edits: Vec<(Range<usize>, String)> = head
        .captures_iter(source)
        .filter_map(|caps: Captures| {
            let whole = caps.get(0)?;
            let target = caps.get(1)?;
            if source.as_bytes().get(whole.end()) == Some(&b'=')
                || !starts_statement(source, whole.start())
                || !remove(target.as_str())
            {
                return None;
            }
            let values = expression_list(source, whole.end());
            log::info!("{}: {}", message, &source[whole.start()..values.end]);
            Some((whole.start()..statement_end(source, values.end), String::new()))
        })
        .collect();
    apply_edits(source, edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_unread_assignments() {
        let src = "var0 = 1\nvar1 = 2\nprint(var1)";
        let (code, count) = remove_unused_assignments(src);
        assert_eq!(code, "\nvar1 = 2\nprint(var1)");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_keeps_comparisons() {
        let src = "if var0 == 1 then end";
        assert_eq!(remove_unused_assignments(src), (src.to_string(), 0));
    }

    #[test]
    fn test_removal_keeps_later_statements_on_the_line() {
        let src = "local var0 = 1 var0 = 2 print(\"live\")";
        let (code, count) = remove_unused_assignments(src);
        assert_eq!(code, "print(\"live\")");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_keeps_field_assignments() {
        let src = "t.var0 = 1";
        assert_eq!(remove_unused_assignments(src), (src.to_string(), 0));
    }

    #[test]
    fn test_table_key_removal_is_statement_bounded() {
        let (code, count) = remove_unused_table_keys("G.dead = 5; G.live = 1 print(G.live)");
        assert_eq!(code, "G.live = 1 print(G.live)");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_removes_single_use_table_keys() {
        let src = "G.unused = 1\nG.used = 2\nprint(G.used)";
        let (code, count) = remove_unused_table_keys(src);
        assert_eq!(code, "\nG.used = 2\nprint(G.used)");
        assert_eq!(count, 1);
    }
}
