//! Support-function string decoding
//!
//! The obfuscator routes its string literals through `M.b(...)`, `M.f(...)`
//! and `M.t(...)`. Each `M.b` argument is run through the scheme heuristic
//! and the rewritten argument replaces the one in that call only.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use super::{Pass, PassContext};
use crate::encoding::{reverse_obfuscation, Reversed, StringMode};
use crate::error::Result;
use crate::lua::{closing_bracket, quote, unquote};

/// `M.b(` up to and including the opening parenthesis
static SUPPORT_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bM\.b\(").unwrap());

static NESTED_SUPPORT_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bM\.[bft]\(").unwrap());

pub struct StringDecoderPass;

impl Pass for StringDecoderPass {
    fn name(&self) -> &'static str {
        "string_decoder"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let (code, rewritten) = decode_strings(source, ctx.options.string_mode);
        for _ in 0..rewritten {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.decode_strings
    }
}

/// Rewrite the argument of every `M.b(...)` call.
///
/// Returns the new code and the number of calls whose argument changed.
pub fn decode_strings(source: &str, mode: StringMode) -> (String, usize) {
    let mut code = String::with_capacity(source.len());
    let mut last = 0;
    let mut rewritten = 0;

    for (argument, close) in call_arguments(source, &SUPPORT_CALL) {
        if argument.start < last {
            continue;
        }
        let original = &source[argument.clone()];
        let replacement = rewrite_argument(original, mode);
        if replacement != original {
            rewritten += 1;
        }
        code.push_str(&source[last..argument.start]);
        code.push_str(&replacement);
        last = close;
    }
    code.push_str(&source[last..]);

    (code, rewritten)
}

/// Nested support calls inside the argument get their own arguments
/// rewritten; otherwise the whole argument is.
fn rewrite_argument(argument: &str, mode: StringMode) -> String {
    let inner = call_arguments(argument, &NESTED_SUPPORT_CALL);
    if inner.is_empty() {
        return transform(argument, mode);
    }

    let mut out = String::with_capacity(argument.len());
    let mut last = 0;
    for (span, close) in inner {
        if span.start < last {
            continue;
        }
        out.push_str(&argument[last..span.start]);
        out.push_str(&transform(&argument[span], mode));
        last = close;
    }
    out.push_str(&argument[last..]);
    out
}

/// Argument span of each call whose head matches `head`, paired with the
/// offset of its closing parenthesis. Unclosed calls are skipped.
fn call_arguments(source: &str, head: &Regex) -> Vec<(Range<usize>, usize)> {
    head.find_iter(source)
        .filter_map(|m| {
            let open = m.end() - 1;
            match closing_bracket(source, open) {
                Some(close) => Some((m.end()..close, close)),
                None => {
                    log::warn!("Unclosed support call at offset {}", m.start());
                    None
                }
            }
        })
        .collect()
}

fn transform(text: &str, mode: StringMode) -> String {
    let reversed = match mode {
        StringMode::Forward => reverse_obfuscation(text, mode),
        StringMode::Inverse => match unquote(text) {
            Some((quote_char, content)) => {
                let decoded = reverse_obfuscation(content, mode);
                Reversed {
                    text: match decoded.scheme {
                        Some(_) => quote(&decoded.text, quote_char),
                        None => text.to_string(),
                    },
                    scheme: decoded.scheme,
                }
            }
            // Only string literals are decoded; expressions stay as written
            None => Reversed {
                scheme: None,
                text: text.to_string(),
            },
        },
    };

    if let Some(scheme) = reversed.scheme {
        log::info!(
            "Deobfuscated string using {}: {} to {}",
            scheme.name(),
            text,
            reversed.text
        );
    }
    reversed.text
}
