//! Keyword-counting pretty printer
//!
//! Block keywords are moved onto lines of their own, then every line is
//! re-indented by counting openers (`do`, `if`, `function`, `repeat`) and
//! closers (`end`, `until`). The level is clamped at zero.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Pass, PassContext};
use crate::error::Result;
use crate::lua::contains_word;

static BREAK_BEFORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:do|end|if|else|elseif|for|while)\b").unwrap());

static BREAK_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(do|then|else|end)[ \t]+").unwrap());

const OPENERS: &[&str] = &["do", "if", "function", "repeat"];
const CLOSERS: &[&str] = &["end", "until"];

pub struct PrettyPrinterPass;

impl Pass for PrettyPrinterPass {
    fn name(&self) -> &'static str {
        "pretty_printer"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let code = prettify(source, ctx.options.indent_width);
        if code != source {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.prettify
    }
}

/// Reformat `source` with one block keyword per line and `indent_width`
/// spaces per level
pub fn prettify(source: &str, indent_width: usize) -> String {
    let code = break_lines(source);

    let mut out: Vec<String> = Vec::new();
    let mut level: usize = 0;
    for line in code.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            if out.last().is_some_and(|prev| prev.is_empty()) {
                continue;
            }
            out.push(String::new());
            continue;
        }

        if CLOSERS.iter().any(|kw| contains_word(line, kw)) {
            level = level.saturating_sub(1);
        }
        out.push(format!("{}{}", " ".repeat(indent_width * level), line));
        if OPENERS.iter().any(|kw| contains_word(line, kw)) {
            level += 1;
        }
    }

    out.join("\n")
}

fn break_lines(source: &str) -> String {
    let mut code = String::with_capacity(source.len() + source.len() / 8);
    let mut last = 0;
    for m in BREAK_BEFORE.find_iter(source) {
        let before = &source[..m.start()];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let starts_line = before[line_start..].trim().is_empty();
        let after_space = before.ends_with(|c: char| c.is_whitespace());
        code.push_str(&source[last..m.start()]);
        if !starts_line && after_space {
            code.push('\n');
        }
        last = m.start();
    }
    code.push_str(&source[last..]);

    BREAK_AFTER
        .replace_all(&code, |caps: &Captures| {
            let whole = caps.get(0).unwrap();
            let rest = &code[whole.end()..];
            if rest.is_empty() || rest.starts_with(['\n', '\r']) {
                whole.as_str().to_string()
            } else {
                format!("{}\n", &caps[1])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_block() {
        assert_eq!(prettify("do x end", 4), "do\n    x\nend");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            prettify("if a then b() else c() end", 4),
            "if a then\n    b()\n    else\n    c()\nend"
        );
    }

    #[test]
    fn test_nested_function() {
        let src = "function var0()\nfor i = 1, 3 do print(i) end\nend";
        assert_eq!(
            prettify(src, 2),
            "function var0()\n  for i = 1, 3\n  do\n    print(i)\n  end\nend"
        );
    }

    #[test]
    fn test_stray_end_does_not_go_negative() {
        assert_eq!(prettify("end\nend\nx", 4), "end\nend\nx");
    }

    #[test]
    fn test_blank_runs_collapse() {
        assert_eq!(prettify("a\n\n\n\nb", 4), "a\n\nb");
    }

    #[test]
    fn test_keywords_inside_identifiers_are_ignored() {
        assert_eq!(prettify("local endpoint = done", 4), "local endpoint = done");
    }
}
