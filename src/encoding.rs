//! String encoding schemes used by the obfuscator's support functions
//!
//! The heuristic tries every scheme in a fixed priority order and keeps the
//! first one that succeeds. In [`StringMode::Forward`] each scheme *encodes*
//! the captured text; in [`StringMode::Inverse`] each scheme *decodes* it and
//! refuses input that does not have its shape.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::error::{Error, Result};

/// Characters left alone by percent encoding: RFC 3986 unreserved plus `/`
const QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

static ESCAPED_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\\x[0-9a-fA-F]{2})+$").unwrap());
static PERCENT_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[0-9a-fA-F]{2}").unwrap());

/// Which direction the string heuristic runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StringMode {
    /// Encode the captured text with the first scheme that succeeds
    #[default]
    Forward,
    /// Decode string literals with the first scheme whose shape matches
    Inverse,
}

/// A single text transformation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Base64,
    Percent,
    Hex,
    EscapedHex,
    RawHex,
    Rot13,
}

impl Scheme {
    /// Priority order of the heuristic
    pub const PRIORITY: [Scheme; 6] = [
        Scheme::Base64,
        Scheme::Percent,
        Scheme::Hex,
        Scheme::EscapedHex,
        Scheme::RawHex,
        Scheme::Rot13,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Base64 => "base64",
            Scheme::Percent => "percent",
            Scheme::Hex => "hex",
            Scheme::EscapedHex => "escaped_hex",
            Scheme::RawHex => "raw_hex",
            Scheme::Rot13 => "rot13",
        }
    }

    /// Encode `text` with this scheme
    pub fn encode(&self, text: &str) -> Result<String> {
        let encoded = match self {
            Scheme::Base64 => STANDARD.encode(text.as_bytes()),
            Scheme::Percent => utf8_percent_encode(text, QUOTE_SET).to_string(),
            Scheme::Hex => hex::encode(text.as_bytes()),
            // One `\x` per character, followed by all of its UTF-8 bytes
            Scheme::EscapedHex => text
                .chars()
                .map(|c| {
                    let mut buf = [0u8; 4];
                    format!("\\x{}", hex::encode(c.encode_utf8(&mut buf).as_bytes()))
                })
                .collect(),
            Scheme::RawHex => text.chars().map(|c| format!("{:02x}", c as u32)).collect(),
            Scheme::Rot13 => rot13(text),
        };
        Ok(encoded)
    }

    /// Decode `text`, failing unless it really looks like this scheme's output
    pub fn decode(&self, text: &str) -> Result<String> {
        let decoded = match self {
            Scheme::Base64 => {
                if text.is_empty() || text.len() % 4 != 0 {
                    return Err(Error::scheme(self.name(), "length is not a multiple of 4"));
                }
                let bytes = STANDARD
                    .decode(text)
                    .map_err(|e| Error::scheme(self.name(), e.to_string()))?;
                utf8(self, bytes)?
            }
            Scheme::Percent => {
                if !PERCENT_ESCAPE.is_match(text) {
                    return Err(Error::scheme(self.name(), "no percent escapes"));
                }
                percent_decode_str(text)
                    .decode_utf8()
                    .map_err(|e| Error::scheme(self.name(), e.to_string()))?
                    .into_owned()
            }
            Scheme::Hex => {
                if text.is_empty() {
                    return Err(Error::scheme(self.name(), "empty input"));
                }
                let bytes =
                    hex::decode(text).map_err(|e| Error::scheme(self.name(), e.to_string()))?;
                utf8(self, bytes)?
            }
            Scheme::EscapedHex => {
                if !ESCAPED_HEX.is_match(text) {
                    return Err(Error::scheme(self.name(), "not a run of \\xNN escapes"));
                }
                let digits: String = text.split("\\x").collect();
                let bytes =
                    hex::decode(digits).map_err(|e| Error::scheme(self.name(), e.to_string()))?;
                utf8(self, bytes)?
            }
            Scheme::RawHex => {
                if text.is_empty() {
                    return Err(Error::scheme(self.name(), "empty input"));
                }
                let bytes =
                    hex::decode(text).map_err(|e| Error::scheme(self.name(), e.to_string()))?;
                bytes.into_iter().map(char::from).collect()
            }
            Scheme::Rot13 => {
                if !text.chars().any(|c| c.is_ascii_alphabetic()) {
                    return Err(Error::scheme(self.name(), "nothing to rotate"));
                }
                rot13(text)
            }
        };

        if !is_printable(&decoded) {
            return Err(Error::scheme(self.name(), "decoded text is not printable"));
        }
        Ok(decoded)
    }
}

/// Outcome of running the heuristic on one piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reversed {
    /// Scheme that produced `text`, `None` when every scheme failed
    pub scheme: Option<Scheme>,
    pub text: String,
}

/// Run the scheme chain over `text` in priority order.
///
/// Each failing attempt is skipped; when all of them fail the input comes
/// back unchanged.
pub fn reverse_obfuscation(text: &str, mode: StringMode) -> Reversed {
    for scheme in Scheme::PRIORITY {
        let attempt = match mode {
            StringMode::Forward => scheme.encode(text),
            StringMode::Inverse => scheme.decode(text),
        };
        match attempt {
            Ok(out) => {
                return Reversed {
                    scheme: Some(scheme),
                    text: out,
                }
            }
            Err(e) => log::trace!("{}", e),
        }
    }

    Reversed {
        scheme: None,
        text: text.to_string(),
    }
}

fn utf8(scheme: &Scheme, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::scheme(scheme.name(), e.to_string()))
}

fn is_printable(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| !c.is_control() || c.is_whitespace())
}

fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}
