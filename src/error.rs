use miette::Diagnostic;
use thiserror::Error;

/// Result type for deobfuscator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custom error types for the Lua deobfuscator
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error("I/O error on {path}: {message}")]
    #[diagnostic(code(lua_deobf::io_error))]
    Io { path: String, message: String },

    #[error("Invalid rewrite pattern: {message}")]
    #[diagnostic(code(lua_deobf::pattern_error))]
    Pattern { message: String },

    #[error("{scheme} transform failed: {message}")]
    #[diagnostic(code(lua_deobf::scheme_error))]
    Scheme {
        scheme: &'static str,
        message: String,
    },

    #[error("Failed to write report: {message}")]
    #[diagnostic(code(lua_deobf::report_error))]
    Report { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(lua_deobf::internal_error))]
    Internal { message: String },
}

impl Error {
    /// Create an I/O error tagged with the path it happened on
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Create a scheme error
    pub fn scheme(scheme: &'static str, message: impl Into<String>) -> Self {
        Error::Scheme {
            scheme,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Report {
            message: err.to_string(),
        }
    }
}
