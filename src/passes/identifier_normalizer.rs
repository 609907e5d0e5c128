//! Identifier normalization
//!
//! Every name introduced by `local` or by a `function name(` declaration is
//! replaced with a positional synthetic name (`var0`, `var1`, ...). Names are
//! numbered in the order they first appear in the source.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

use super::{BindingKind, IdentifierMapping, Pass, PassContext};
use crate::error::Result;
use crate::lua::{is_keyword, is_synthetic, SYNTHETIC_NAME};

static LOCAL_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blocal[ \t]+(\w+(?:[ \t]*,[ \t]*\w+)*)").unwrap());

/// Plain `function name(`; dotted and method names are left alone
static FUNCTION_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction[ \t]+(\w+)[ \t]*\(").unwrap());

pub struct IdentifierNormalizerPass;

impl Pass for IdentifierNormalizerPass {
    fn name(&self) -> &'static str {
        "identifier_normalizer"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let (code, mapping) = normalize_identifiers(source)?;
        for _ in 0..mapping.len() {
            ctx.record_rewrite();
        }
        ctx.mapping = mapping;
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.normalize_identifiers
    }
}

/// Discover declared names in `source` and rename all of them.
///
/// Returns the rewritten code and the mapping that was applied. Names that
/// are already synthetic are not renamed again.
pub fn normalize_identifiers(source: &str) -> Result<(String, IdentifierMapping)> {
    let mapping = discover(source);
    if mapping.is_empty() {
        return Ok((source.to_string(), mapping));
    }

    let alternation = mapping
        .iter()
        .map(|b| regex::escape(&b.original))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(r"\b(?:{})\b", alternation))?;

    let code = pattern
        .replace_all(source, |caps: &Captures| {
            let original = &caps[0];
            mapping.get(original).unwrap_or(original).to_string()
        })
        .into_owned();

    for binding in mapping.iter() {
        log::info!(
            "Renamed variable: {} to {}",
            binding.original,
            binding.synthetic
        );
    }

    Ok((code, mapping))
}

/// Collect declared names in first-appearance order and number them
fn discover(source: &str) -> IdentifierMapping {
    let mut found: Vec<(usize, &str, BindingKind)> = Vec::new();

    for caps in LOCAL_DECL.captures_iter(source) {
        let Some(list) = caps.get(1) else {
            continue;
        };
        let mut offset = list.start();
        for part in list.as_str().split(',') {
            let name = part.trim();
            found.push((offset, name, BindingKind::Local));
            offset += part.len() + 1;
        }
    }
    for caps in FUNCTION_DECL.captures_iter(source) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        found.push((name.start(), name.as_str(), BindingKind::Function));
    }
    found.sort_by_key(|(offset, _, _)| *offset);

    let taken: HashSet<&str> = SYNTHETIC_NAME
        .find_iter(source)
        .map(|m| m.as_str())
        .collect();

    let mut mapping = IdentifierMapping::new();
    let mut ordinal = 0usize;
    for (_, name, kind) in found {
        if !is_renamable(name) {
            continue;
        }
        if mapping.contains(name) {
            // Seen before: only the declaration kind can change
            mapping.insert(name, String::new(), kind);
            continue;
        }
        let synthetic = loop {
            let candidate = format!("var{}", ordinal);
            ordinal += 1;
            if !taken.contains(candidate.as_str()) {
                break candidate;
            }
        };
        mapping.insert(name, synthetic, kind);
    }

    mapping
}

fn is_renamable(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && !is_keyword(name)
        && !is_synthetic(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_order() {
        let (code, mapping) = normalize_identifiers("local zeta = 1\nlocal alpha = zeta").unwrap();
        assert_eq!(mapping.get("zeta"), Some("var0"));
        assert_eq!(mapping.get("alpha"), Some("var1"));
        assert_eq!(code, "local var0 = 1\nlocal var1 = var0");
    }

    #[test]
    fn test_whole_word_only() {
        let (code, _) = normalize_identifiers("local a = 1\nlocal ab = a + ab").unwrap();
        assert_eq!(code, "local var0 = 1\nlocal var1 = var0 + var1");
    }

    #[test]
    fn test_local_function_does_not_rename_keyword() {
        let (code, mapping) =
            normalize_identifiers("local function helper(x) return x end\nhelper(1)").unwrap();
        assert!(!mapping.contains("function"));
        assert_eq!(code, "local function var0(x) return x end\nvar0(1)");
    }

    #[test]
    fn test_dotted_function_names_survive() {
        let (code, mapping) = normalize_identifiers("function M.b(s) return s end").unwrap();
        assert!(mapping.is_empty());
        assert_eq!(code, "function M.b(s) return s end");
    }

    #[test]
    fn test_name_lists() {
        let (code, _) = normalize_identifiers("local x, y = 1, 2\nprint(y, x)").unwrap();
        assert_eq!(code, "local var0, var1 = 1, 2\nprint(var1, var0)");
    }

    #[test]
    fn test_skips_ordinals_already_in_use() {
        let (code, mapping) = normalize_identifiers("local a = var0").unwrap();
        assert_eq!(mapping.get("a"), Some("var1"));
        assert_eq!(code, "local var1 = var0");
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let src = "local a = 1\nlocal function f() return a end\nf()";
        let (once, _) = normalize_identifiers(src).unwrap();
        let (twice, mapping) = normalize_identifiers(&once).unwrap();
        assert!(mapping.is_empty());
        assert_eq!(once, twice);
    }
}
