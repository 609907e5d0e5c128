//! Rewrite passes applied to the source buffer
//!
//! Each pass consumes the previous pass's text and produces new text. Passes
//! share nothing but the [`PassContext`] created for one pipeline run.

mod arithmetic;
mod dead_code;
mod dead_return;
mod identifier_normalizer;
mod pretty_printer;
mod string_decoder;
mod unused_bindings;
mod unused_stores;

pub use arithmetic::{flip_operators, fold_constants, ArithmeticPass};
pub use dead_code::DeadCodePass;
pub use dead_return::{strip_dead_returns, DeadReturnPass};
pub use identifier_normalizer::{normalize_identifiers, IdentifierNormalizerPass};
pub use pretty_printer::{prettify, PrettyPrinterPass};
pub use string_decoder::{decode_strings, StringDecoderPass};
pub use unused_bindings::UnusedBindingPass;
pub use unused_stores::UnusedStorePass;

use crate::deobfuscator::DeobfuscateOptions;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;

/// Trait for rewrite passes
pub trait Pass {
    /// Get the name of this pass
    fn name(&self) -> &'static str;

    /// Run the pass over the whole buffer
    fn run(&mut self, source: &str, ctx: &mut PassContext) -> Result<String>;

    /// Check if this pass should run
    fn should_run(&self, _options: &DeobfuscateOptions) -> bool {
        true
    }
}

/// How a discovered name was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Local,
    Function,
}

/// One original name and the synthetic name it was given
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub original: String,
    pub synthetic: String,
    pub kind: BindingKind,
}

/// Original identifier to synthetic identifier, in first-appearance order
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentifierMapping {
    bindings: Vec<Binding>,
    #[serde(skip)]
    by_original: HashMap<String, usize>,
}

impl IdentifierMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `original` if it is not mapped yet. A function declaration wins
    /// over a local declaration of the same name.
    pub fn insert(&mut self, original: &str, synthetic: String, kind: BindingKind) {
        if let Some(&idx) = self.by_original.get(original) {
            if kind == BindingKind::Function {
                self.bindings[idx].kind = kind;
            }
            return;
        }
        self.by_original
            .insert(original.to_string(), self.bindings.len());
        self.bindings.push(Binding {
            original: original.to_string(),
            synthetic,
            kind,
        });
    }

    pub fn contains(&self, original: &str) -> bool {
        self.by_original.contains_key(original)
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.by_original
            .get(original)
            .map(|&idx| self.bindings[idx].synthetic.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Synthetic names given to `local` declarations
    pub fn locals(&self) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(|b| b.kind == BindingKind::Local)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A declaration site renamed because its name was declared before
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redefinition {
    pub base: String,
    pub renamed: String,
}

/// Hands out `_1`, `_2`, ... suffixes for repeated declarations of a name
#[derive(Debug, Clone, Default, Serialize)]
pub struct RedefinitionCounter {
    #[serde(skip)]
    counters: HashMap<String, usize>,
    renamed: Vec<Redefinition>,
}

impl RedefinitionCounter {
    /// Next suffixed name for `base`
    pub fn next(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        *counter += 1;
        let renamed = format!("{}_{}", base, counter);
        self.renamed.push(Redefinition {
            base: base.to_string(),
            renamed: renamed.clone(),
        });
        renamed
    }

    pub fn renamed(&self) -> &[Redefinition] {
        &self.renamed
    }
}

/// State for one pipeline run
#[derive(Debug, Default)]
pub struct PassContext {
    pub options: DeobfuscateOptions,
    pub mapping: IdentifierMapping,
    pub redefinitions: RedefinitionCounter,
    rewrites: usize,
}

impl PassContext {
    pub fn new(options: DeobfuscateOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Count one rewrite made by the running pass
    pub fn record_rewrite(&mut self) {
        self.rewrites += 1;
    }

    /// Rewrites recorded since the last call
    pub fn take_rewrites(&mut self) -> usize {
        std::mem::take(&mut self.rewrites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_keeps_first_appearance_order() {
        let mut mapping = IdentifierMapping::new();
        mapping.insert("b", "var0".to_string(), BindingKind::Local);
        mapping.insert("a", "var1".to_string(), BindingKind::Local);
        mapping.insert("b", "var9".to_string(), BindingKind::Local);

        let names: Vec<_> = mapping.iter().map(|b| b.original.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(mapping.get("b"), Some("var0"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_function_kind_wins() {
        let mut mapping = IdentifierMapping::new();
        mapping.insert("f", "var0".to_string(), BindingKind::Local);
        mapping.insert("f", "var1".to_string(), BindingKind::Function);
        assert_eq!(mapping.locals().count(), 0);
        assert_eq!(mapping.get("f"), Some("var0"));
    }

    #[test]
    fn test_redefinition_counter() {
        let mut counter = RedefinitionCounter::default();
        assert_eq!(counter.next("var0"), "var0_1");
        assert_eq!(counter.next("var0"), "var0_2");
        assert_eq!(counter.next("var3"), "var3_1");
        assert_eq!(counter.renamed().len(), 3);
    }
}
