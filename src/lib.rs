//! lua-deobf-rs: Rust-based deobfuscator for Lua scripts
//!
//! This library reverses the idioms of one known Lua obfuscator: positional
//! identifier renaming, encoded string arguments, swapped arithmetic
//! operators, inserted dead code and flattened formatting. Every stage is a
//! text rewrite over the whole source buffer.

pub mod cli;
pub mod deobfuscator;
pub mod encoding;
pub mod error;
pub mod lua;
pub mod passes;

pub use deobfuscator::{deobfuscate, DeobfuscateOptions, Deobfuscated, Deobfuscator};
pub use error::{Error as DeobfuscatorError, Result as DeobfuscatorResult};

// Re-export commonly used types
pub use encoding::{reverse_obfuscation, Scheme, StringMode};
pub use passes::{IdentifierMapping, Pass, PassContext};
