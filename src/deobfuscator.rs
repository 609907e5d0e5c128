//! Main deobfuscator module
//!
//! This module orchestrates the rewrite passes from obfuscated source text to
//! the cleaned, re-indented result.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::encoding::StringMode;
use crate::error::{Error, Result};
use crate::passes::{
    ArithmeticPass, DeadCodePass, DeadReturnPass, IdentifierMapping, IdentifierNormalizerPass,
    Pass, PassContext, PrettyPrinterPass, Redefinition, StringDecoderPass, UnusedBindingPass,
    UnusedStorePass,
};

/// Options controlling which passes run and how
#[derive(Debug, Clone)]
pub struct DeobfuscateOptions {
    pub normalize_identifiers: bool,
    pub strip_dead_returns: bool,
    pub remove_unused_bindings: bool,
    pub decode_strings: bool,
    pub string_mode: StringMode,
    pub flip_arithmetic: bool,
    pub fold_constants: bool,
    pub remove_dead_code: bool,
    pub remove_unused_stores: bool,
    pub prettify: bool,
    /// Spaces per indentation level
    pub indent_width: usize,
}

impl Default for DeobfuscateOptions {
    fn default() -> Self {
        Self {
            normalize_identifiers: true,
            strip_dead_returns: true,
            remove_unused_bindings: true,
            decode_strings: true,
            string_mode: StringMode::Forward,
            flip_arithmetic: true,
            fold_constants: true,
            remove_dead_code: true,
            remove_unused_stores: true,
            prettify: true,
            indent_width: 4,
        }
    }
}

impl DeobfuscateOptions {
    /// Create options from CLI flags; every `no_*` flag turns one pass off
    #[allow(clippy::too_many_arguments)]
    pub fn from_cli(
        string_mode: StringMode,
        indent_width: usize,
        no_rename: bool,
        no_dead_returns: bool,
        no_unused_bindings: bool,
        no_strings: bool,
        no_arithmetic: bool,
        no_constant_folding: bool,
        no_dead_code: bool,
        no_unused_stores: bool,
        no_prettify: bool,
    ) -> Self {
        Self {
            normalize_identifiers: !no_rename,
            strip_dead_returns: !no_dead_returns,
            remove_unused_bindings: !no_unused_bindings,
            decode_strings: !no_strings,
            string_mode,
            flip_arithmetic: !no_arithmetic,
            fold_constants: !no_constant_folding,
            remove_dead_code: !no_dead_code,
            remove_unused_stores: !no_unused_stores,
            prettify: !no_prettify,
            indent_width,
        }
    }
}

/// What one pass did to the buffer
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass: &'static str,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub rewrites: usize,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct Deobfuscated {
    #[serde(skip)]
    pub code: String,
    pub mapping: IdentifierMapping,
    pub redefinitions: Vec<Redefinition>,
    pub passes: Vec<PassReport>,
}

impl Deobfuscated {
    /// Rename mapping, redefinitions and pass statistics as JSON
    pub fn report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Main deobfuscator struct
pub struct Deobfuscator {
    options: DeobfuscateOptions,
    passes: Vec<Box<dyn Pass>>,
}

impl Deobfuscator {
    /// Create a deobfuscator with the standard pass order
    pub fn new(options: DeobfuscateOptions) -> Self {
        let passes: Vec<Box<dyn Pass>> = vec![
            Box::new(IdentifierNormalizerPass),
            Box::new(DeadReturnPass),
            Box::new(UnusedBindingPass),
            Box::new(StringDecoderPass),
            Box::new(ArithmeticPass),
            Box::new(DeadCodePass),
            Box::new(UnusedStorePass),
            Box::new(PrettyPrinterPass),
        ];
        Self { options, passes }
    }

    /// Names of the passes in the order they run
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every enabled pass over `source`
    pub fn run(&mut self, source: &str) -> Result<Deobfuscated> {
        let mut ctx = PassContext::new(self.options.clone());
        let mut code = source.to_string();
        let mut reports = Vec::new();

        for pass in self.passes.iter_mut() {
            if !pass.should_run(&self.options) {
                log::debug!("Skipping pass {}", pass.name());
                continue;
            }

            let bytes_before = code.len();
            code = pass.run(&code, &mut ctx)?;
            let rewrites = ctx.take_rewrites();
            log::debug!(
                "Pass {} made {} rewrites ({} -> {} bytes)",
                pass.name(),
                rewrites,
                bytes_before,
                code.len()
            );
            reports.push(PassReport {
                pass: pass.name(),
                bytes_before,
                bytes_after: code.len(),
                rewrites,
            });
        }

        Ok(Deobfuscated {
            code,
            redefinitions: ctx.redefinitions.renamed().to_vec(),
            mapping: ctx.mapping,
            passes: reports,
        })
    }
}

/// Deobfuscate one file with the given options
pub fn deobfuscate_file(
    input_path: &Path,
    output_path: &Path,
    options: DeobfuscateOptions,
) -> Result<Deobfuscated> {
    let source = fs::read_to_string(input_path).map_err(|e| Error::io(input_path, e))?;
    let result = Deobfuscator::new(options).run(&source)?;
    fs::write(output_path, &result.code).map_err(|e| Error::io(output_path, e))?;
    log::info!(
        "Deobfuscated and prettified code written to: {}",
        output_path.display()
    );
    Ok(result)
}

/// Read `input_path`, run the full pipeline and write the result to
/// `output_path`
pub fn deobfuscate(input_path: &Path, output_path: &Path) -> Result<()> {
    deobfuscate_file(input_path, output_path, DeobfuscateOptions::default()).map(|_| ())
}
