use crate::encoding::{reverse_obfuscation, StringMode};
use crate::error::Result as DeobfuscatorResult;

/// Run the decode subcommand: push one string through the scheme heuristic
pub fn decode(text: &str, mode: StringMode) -> DeobfuscatorResult<()> {
    let reversed = reverse_obfuscation(text, mode);
    let scheme = reversed.scheme.map_or("none", |s| s.name());
    println!("{}: {}", scheme, reversed.text);
    Ok(())
}
