use clap::{Parser, Subcommand};
use miette::{miette, Result};
use std::path::PathBuf;

use lua_deobf_rs::cli;
use lua_deobf_rs::StringMode;

#[derive(Parser)]
#[command(name = "lua-deobf-rs")]
#[command(about = "Rust-based deobfuscator for Lua scripts")]
#[command(version)]
struct Cli {
    /// Log every skipped decision as well
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deobfuscate a Lua file, or every .lua file in a directory
    Deobfuscate {
        /// Input Lua file or directory
        input: PathBuf,

        /// Output file or directory (defaults to stdout for a single file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the rename mapping and pass statistics as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Direction of the string heuristic
        #[arg(long, value_enum, default_value = "forward")]
        string_mode: StringMode,

        /// Spaces per indentation level
        #[arg(long, default_value_t = 4)]
        indent: usize,

        /// Skip identifier renaming
        #[arg(long)]
        no_rename: bool,

        /// Skip trailing-whitespace cleanup after return
        #[arg(long)]
        no_dead_returns: bool,

        /// Skip unused-binding elimination
        #[arg(long)]
        no_unused_bindings: bool,

        /// Skip string decoding
        #[arg(long)]
        no_strings: bool,

        /// Skip the +/- operator flip
        #[arg(long)]
        no_arithmetic: bool,

        /// Skip constant folding
        #[arg(long)]
        no_constant_folding: bool,

        /// Skip dead branch, loop, call and function removal
        #[arg(long)]
        no_dead_code: bool,

        /// Skip the late unused-store sweep
        #[arg(long)]
        no_unused_stores: bool,

        /// Skip re-indentation
        #[arg(long)]
        no_prettify: bool,
    },

    /// Run the string heuristic on a single string
    Decode {
        /// Text to transform
        text: String,

        /// Direction of the string heuristic
        #[arg(long, value_enum, default_value = "inverse")]
        string_mode: StringMode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Deobfuscate {
            input,
            output,
            report,
            string_mode,
            indent,
            no_rename,
            no_dead_returns,
            no_unused_bindings,
            no_strings,
            no_arithmetic,
            no_constant_folding,
            no_dead_code,
            no_unused_stores,
            no_prettify,
        } => {
            let args = cli::deobfuscate::DeobfuscateArgs {
                input_path: input,
                output_path: output,
                report_path: report,
                string_mode,
                indent_width: indent,
                no_rename,
                no_dead_returns,
                no_unused_bindings,
                no_strings,
                no_arithmetic,
                no_constant_folding,
                no_dead_code,
                no_unused_stores,
                no_prettify,
            };
            cli::deobfuscate::deobfuscate(&args).map_err(|e| miette!("{}", e))
        }
        Commands::Decode { text, string_mode } => {
            cli::decode::decode(&text, string_mode).map_err(|e| miette!("{}", e))
        }
    }
}
