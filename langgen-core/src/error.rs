use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("invalid language description {path}: {message}")]
    Description { path: PathBuf, message: String },
    #[error("lex error at byte {position}: {message}")]
    LexError { position: usize, message: String },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("specification error: {0}")]
    Specification(Diagnostic),
    #[error("type error: {0}")]
    TypeError(Diagnostic),
    #[error("cannot compute the maximum number of characters this pattern will accept: {pattern:?}")]
    UnknownExtent { pattern: String },
    #[error("render error: {0}")]
    Render(String),
}

impl CoreError {
    pub fn specification(message: impl Into<String>, code: &'static str) -> Self {
        CoreError::Specification(Diagnostic::error(message).with_code(code))
    }

    pub fn type_error(message: impl Into<String>, code: &'static str) -> Self {
        CoreError::TypeError(Diagnostic::error(message).with_code(code))
    }

    /// The diagnostic carried by specification and type errors.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CoreError::Specification(diag) | CoreError::TypeError(diag) => Some(diag),
            _ => None,
        }
    }

    /// Attach the construct being compiled to a diagnostic-carrying error.
    pub fn in_context(self, context: impl Into<String>) -> Self {
        match self {
            CoreError::Specification(diag) if diag.context.is_none() => {
                CoreError::Specification(diag.with_context(context))
            }
            CoreError::TypeError(diag) if diag.context.is_none() => {
                CoreError::TypeError(diag.with_context(context))
            }
            other => other,
        }
    }
}

/// Abort with `error()` unless `condition` holds.
///
/// This is the single reporting primitive used for malformed input.
pub fn check(condition: bool, error: impl FnOnce() -> CoreError) -> Result<(), CoreError> {
    if condition { Ok(()) } else { Err(error()) }
}
