//! Trailing-whitespace cleanup after `return`
//!
//! Only `return` followed by horizontal whitespace up to the end of its line
//! is touched; statements after a return are left in place.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Pass, PassContext};
use crate::error::Result;

static TRAILING_RETURN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\breturn[ \t]+$").unwrap());

pub struct DeadReturnPass;

impl Pass for DeadReturnPass {
    fn name(&self) -> &'static str {
        "dead_return"
    }

    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String> {
        let hits = TRAILING_RETURN.find_iter(source).count();
        for _ in 0..hits {
            ctx.record_rewrite();
        }
        Ok(strip_dead_returns(source))
    }

    fn should_run(&self, options: &crate::DeobfuscateOptions) -> bool {
        options.strip_dead_returns
    }
}

/// Collapse `return   ` at end of line into `return`
pub fn strip_dead_returns(source: &str) -> String {
    let code = TRAILING_RETURN.replace_all(source, "return");
    if code != source {
        log::info!("Removed dead code");
    } else {
        log::debug!("No dead code found");
    }
    code.into_owned()
}
