//! Unused-binding elimination and redefinition suffixing
//!
//! The used-name set is taken once, right after renaming, and stays fixed
//! for the whole pass. A binding that only becomes unused because of a
//! removal made here is left for the later store sweep.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use super::{IdentifierMapping, Pass, PassContext, RedefinitionCounter};
use crate::error::Result;
use crate::lua::{
    apply_edits, expression_list, starts_statement, statement_end, word_pattern, UsageIndex,
};

/// `local a, b` with an optional `=`
static LOCAL_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\blocal[ \t]+(\w+(?:[ \t]*,[ \t]*\w+)*)[ \t]*(=)?").unwrap()
});

pub struct UnusedBindingPass;

impl Pass for UnusedBindingPass {
    fn name(&self) -> &'static str {
        "unused_bindings"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let (code, removed) = eliminate_unused_bindings(source, &ctx.mapping)?;
        let before = ctx.redefinitions.renamed().len();
        let code = suffix_redefinitions(&code, &ctx.mapping, &mut ctx.redefinitions)?;
        let renamed = ctx.redefinitions.renamed().len() - before;
        for _ in 0..removed + renamed {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.remove_unused_bindings
    }
}

/// Remove the declarations of renamed locals that are never read.
///
/// Returns the new code and the number of bindings removed.
pub fn eliminate_unused_bindings(
    source: &str,
    mapping: &IdentifierMapping,
) -> Result<(String, usize)> {
    let usage = UsageIndex::build(source);
    let mut code = source.to_string();
    let mut removed = 0;

    for binding in mapping.locals() {
        let name = binding.synthetic.as_str();
        if usage.is_used(name) {
            log::debug!("Variable {} is used", name);
            continue;
        }

        code = remove_declarations(&code, name)?;
        code = word_pattern(name)?.replace_all(&code, "").into_owned();

        log::info!("Removed unused variable: {}", name);
        removed += 1;
    }

    Ok((code, removed))
}

/// Drop every `local` declaration and plain assignment of `name`.
///
/// Only the statement itself goes. In a `local a, b = 1, 2` list the name
/// and its value are taken out and the rest of the list stays.
fn remove_declarations(source: &str, name: &str) -> Result<String> {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for caps in LOCAL_STATEMENT.captures_iter(source) {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let names: Vec<&str> = list.as_str().split(',').map(str::trim).collect();
        let Some(index) = names.iter().position(|n| *n == name) else {
            continue;
        };
        let values = caps
            .get(2)
            .filter(|eq| source.as_bytes().get(eq.end()) != Some(&b'='))
            .map(|eq| expression_list(source, eq.end()));
        let end = values.as_ref().map_or(list.end(), |v| v.end);

        if names.len() == 1 {
            edits.push((whole.start()..statement_end(source, end), String::new()));
            continue;
        }

        let kept_names: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, n)| *n)
            .collect();
        let mut declaration = format!("local {}", kept_names.join(", "));
        if let Some(values) = &values {
            let kept_values: Vec<&str> = values
                .items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, span)| &source[span.clone()])
                .collect();
            if !kept_values.is_empty() {
                declaration.push_str(" = ");
                declaration.push_str(&kept_values.join(", "));
            }
        }
        edits.push((whole.start()..end, declaration));
    }

    let assignment = Regex::new(&format!(r"\b{}[ \t]*=", regex::escape(name)))?;
    for m in assignment.find_iter(source) {
        if source.as_bytes().get(m.end()) == Some(&b'=') || !starts_statement(source, m.start()) {
            continue;
        }
        let values = expression_list(source, m.end());
        edits.push((m.start()..statement_end(source, values.end), String::new()));
    }

    Ok(apply_edits(source, edits).0)
}

/// Give every `local` re-declaration after the first a `_N` suffix.
///
/// Only the declaration token itself is renamed.
pub fn suffix_redefinitions(
    source: &str,
    mapping: &IdentifierMapping,
    counter: &mut RedefinitionCounter,
) -> Result<String> {
    let mut code = source.to_string();

    for binding in mapping.iter() {
        let name = binding.synthetic.as_str();
        let declaration = Regex::new(&format!(r"\blocal[ \t]+{}\b", regex::escape(name)))?;
        let sites: Vec<_> = declaration
            .find_iter(&code)
            .map(|m| m.range())
            .collect();

        if sites.len() < 2 {
            log::debug!("Variable {} is not redefined", binding.original);
            continue;
        }

        let mut rewritten = String::with_capacity(code.len());
        let mut last = 0;
        for site in sites.into_iter().skip(1) {
            let renamed = counter.next(name);
            rewritten.push_str(&code[last..site.start]);
            rewritten.push_str("local ");
            rewritten.push_str(&renamed);
            last = site.end;
            log::info!(
                "Renamed redefined variable: {} to {}",
                binding.original,
                renamed
            );
        }
        rewritten.push_str(&code[last..]);
        code = rewritten;
    }

    Ok(code)
}
