use crate::cli::utils::{read_source, write_output};
use crate::deobfuscator::{deobfuscate_file, DeobfuscateOptions, Deobfuscated, Deobfuscator};
use crate::encoding::StringMode;
use crate::error::{Error as DeobfuscatorError, Result as DeobfuscatorResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the deobfuscate command
#[derive(Debug, Clone)]
pub struct DeobfuscateArgs {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub string_mode: StringMode,
    pub indent_width: usize,
    pub no_rename: bool,
    pub no_dead_returns: bool,
    pub no_unused_bindings: bool,
    pub no_strings: bool,
    pub no_arithmetic: bool,
    pub no_constant_folding: bool,
    pub no_dead_code: bool,
    pub no_unused_stores: bool,
    pub no_prettify: bool,
}

impl DeobfuscateArgs {
    /// Convert to DeobfuscateOptions
    pub fn to_options(&self) -> DeobfuscateOptions {
        DeobfuscateOptions::from_cli(
            self.string_mode,
            self.indent_width,
            self.no_rename,
            self.no_dead_returns,
            self.no_unused_bindings,
            self.no_strings,
            self.no_arithmetic,
            self.no_constant_folding,
            self.no_dead_code,
            self.no_unused_stores,
            self.no_prettify,
        )
    }
}

/// Run the deobfuscate subcommand
pub fn deobfuscate(args: &DeobfuscateArgs) -> DeobfuscatorResult<()> {
    if args.input_path.is_dir() {
        let output_dir = args.output_path.as_deref().ok_or_else(|| DeobfuscatorError::Internal {
            message: format!(
                "An output directory is required when the input is a directory: {}",
                args.input_path.display()
            ),
        })?;
        return deobfuscate_directory(&args.input_path, output_dir, args);
    }

    let source = read_source(&args.input_path)?;
    let result = Deobfuscator::new(args.to_options()).run(&source)?;

    write_output(&result.code, args.output_path.as_deref())?;
    if let Some(path) = &args.output_path {
        eprintln!("Deobfuscated code written to: {}", path.display());
    }

    if let Some(report_path) = &args.report_path {
        write_output(&result.report_json()?, Some(report_path))?;
    }

    Ok(())
}

/// Deobfuscate every `.lua` file directly inside `input_dir`
fn deobfuscate_directory(
    input_dir: &Path,
    output_dir: &Path,
    args: &DeobfuscateArgs,
) -> DeobfuscatorResult<()> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)
        .map_err(|e| DeobfuscatorError::io(input_dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "lua"))
        .collect();
    inputs.sort();

    fs::create_dir_all(output_dir).map_err(|e| DeobfuscatorError::io(output_dir, e))?;

    eprintln!("Deobfuscating {} files...", inputs.len());
    let progress_bar = indicatif::ProgressBar::new(inputs.len() as u64);
    progress_bar.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
            .map_err(|e| DeobfuscatorError::internal(e.to_string()))?
            .progress_chars("##-"),
    );

    let options = args.to_options();
    let mut results: BTreeMap<String, Deobfuscated> = BTreeMap::new();
    for input in &inputs {
        let Some(file_name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(file_name);
        let result = deobfuscate_file(input, &output, options.clone())?;
        results.insert(file_name.to_string_lossy().into_owned(), result);
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Deobfuscation completed");

    if let Some(report_path) = &args.report_path {
        let json = serde_json::to_string_pretty(&results)?;
        write_output(&json, Some(report_path))?;
    }

    Ok(())
}
