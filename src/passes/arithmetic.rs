//! Arithmetic normalization
//!
//! The obfuscator swaps `+` and `-` in two-operand assignments between named
//! values, so those get flipped back. Running the flip twice restores the
//! original operator. Constant `a / b + c` expressions are folded.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Pass, PassContext};
use crate::error::Result;

static BINARY_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(var\d+(?:_\d+)?) = (var\d+(?:_\d+)?) (.) (var\d+(?:_\d+)?)\b").unwrap()
});

/// `a / b + c` with the token before it and anything binding tighter after
/// it captured, so unary minus and `*`, `/`, `%`, `^` neighbours can be
/// refused
static DIVIDE_ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(^|[^\w\s.*/^%#-]|\b(?:return|then|do|else|and|or|in))([ \t]*)(\d+\.\d+) / (\d+\.\d+) \+ (\d+\.\d+)([ \t]*[*/%^]|\w)?",
    )
    .unwrap()
});

pub struct ArithmeticPass;

impl Pass for ArithmeticPass {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let mut code = source.to_string();
        let mut rewrites = 0;
        if ctx.options.flip_arithmetic {
            let (flipped, count) = flip_operators(&code);
            code = flipped;
            rewrites += count;
        }
        if ctx.options.fold_constants {
            let (folded, count) = fold_constants(&code);
            code = folded;
            rewrites += count;
        }
        for _ in 0..rewrites {
            ctx.record_rewrite();
        }
        Ok(code)
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.flip_arithmetic || options.fold_constants
    }
}

/// Swap `+` and `-` in `varA = varB op varC` assignments
pub fn flip_operators(source: &str) -> (String, usize) {
    let mut flipped = 0;
    let code = BINARY_ASSIGNMENT
        .replace_all(source, |caps: &Captures| {
            let (target, lhs, op, rhs) = (&caps[1], &caps[2], &caps[3], &caps[4]);
            let swapped = match op {
                "+" => "-",
                "-" => "+",
                // TODO: handle `*` and `/` once the obfuscator's pairing for them is known
                _ => return caps[0].to_string(),
            };
            flipped += 1;
            log::info!(
                "Deobfuscated arithmetic operation: {} = {} {} {} to {} = {} {} {}",
                target,
                lhs,
                op,
                rhs,
                target,
                lhs,
                swapped,
                rhs
            );
            format!("{} = {} {} {}", target, lhs, swapped, rhs)
        })
        .into_owned();
    (code, flipped)
}

/// Replace `x.y / x.y + x.y` with its value.
///
/// Skipped when a unary minus or a tighter-binding operator touches the
/// expression, since folding it alone would change the result.
pub fn fold_constants(source: &str) -> (String, usize) {
    let mut folded = 0;
    let code = DIVIDE_ADD
        .replace_all(source, |caps: &Captures| {
            if caps.get(6).is_some() {
                log::debug!("Not folding inside a tighter expression: {}", &caps[0]);
                return caps[0].to_string();
            }
            let operand = |i: usize| caps[i].parse::<f64>().ok();
            let (Some(num), Some(den), Some(add)) = (operand(3), operand(4), operand(5)) else {
                return caps[0].to_string();
            };
            if den == 0.0 {
                log::debug!("Not folding division by zero: {}", &caps[0]);
                return caps[0].to_string();
            }
            let value = format_float(num / den + add);
            folded += 1;
            log::info!(
                "Simplified calculation: {} / {} + {} to {}",
                &caps[3],
                &caps[4],
                &caps[5],
                value
            );
            format!("{}{}{}", &caps[1], &caps[2], value)
        })
        .into_owned();
    (code, folded)
}

/// Decimal float literal, always with a fractional part for whole values
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_plus_and_minus() {
        let (code, count) = flip_operators("var2 = var0 + var1\nvar3 = var1 - var0");
        assert_eq!(code, "var2 = var0 - var1\nvar3 = var1 + var0");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_flip_twice_round_trips() {
        let src = "local var1 = var0 + var0";
        let (once, _) = flip_operators(src);
        let (twice, _) = flip_operators(&once);
        assert_eq!(once, "local var1 = var0 - var0");
        assert_eq!(twice, src);
    }

    #[test]
    fn test_other_operators_untouched() {
        let src = "var2 = var0 * var1";
        assert_eq!(flip_operators(src), (src.to_string(), 0));
    }

    #[test]
    fn test_fold_divide_add() {
        let (code, count) = fold_constants("x = 5.0 / 2.0 + 0.5");
        assert_eq!(code, "x = 3.0");
        assert_eq!(count, 1);
        assert_eq!(fold_constants("y = 1.0 / 4.0 + 0.0").0, "y = 0.25");
    }

    #[test]
    fn test_fold_respects_unary_minus_and_precedence() {
        for src in [
            "x = -1.0 / 2.0 + 3.0",
            "x = a - 1.0 / 2.0 + 3.0",
            "x = 1.0 / 2.0 + 3.0 * 2.0",
            "x = 2.0 * 1.0 / 2.0 + 3.0",
            "x = not 1.0 / 2.0 + 3.0",
        ] {
            assert_eq!(fold_constants(src), (src.to_string(), 0), "{}", src);
        }
        assert_eq!(fold_constants("return 1.0 / 2.0 + 3.0").0, "return 3.5");
        assert_eq!(fold_constants("f(1.0 / 4.0 + 1.0)").0, "f(1.25)");
    }

    #[test]
    fn test_fold_skips_zero_divisor() {
        let src = "x = 1.0 / 0.0 + 2.0";
        assert_eq!(fold_constants(src), (src.to_string(), 0));
    }
}
