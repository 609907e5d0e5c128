//! Command-line interface module
//!
//! This module contains the implementations for the CLI subcommands.

pub mod decode;
pub mod deobfuscate;

/// Common CLI utilities
pub mod utils {
    use crate::error::{Error as DeobfuscatorError, Result as DeobfuscatorResult};
    use std::path::Path;

    /// Read a source file as text
    pub fn read_source(path: &Path) -> DeobfuscatorResult<String> {
        std::fs::read_to_string(path).map_err(|e| DeobfuscatorError::io(path, e))
    }

    /// Write output to file or stdout
    pub fn write_output(content: &str, output_path: Option<&Path>) -> DeobfuscatorResult<()> {
        match output_path {
            Some(path) => std::fs::write(path, content).map_err(|e| DeobfuscatorError::io(path, e)),
            None => {
                println!("{}", content);
                Ok(())
            }
        }
    }
}
