//! Unified error type for callmap.
//!
//! The analysis core does not raise errors for inference gaps; those are
//! recorded as unresolved call sites with a failure reason. The only
//! conditions surfaced as `Err` are the ones the caller can act on:
//! parser construction failures, parse failures, and I/O on source files.

use thiserror::Error;

// ============================================================================
// Unified Error Type
// ============================================================================

/// Errors surfaced to callers of the analysis core.
#[derive(Debug, Error)]
pub enum CallmapError {
    /// The tree-sitter grammar could not be loaded into a parser.
    #[error("parser initialization failed: {message}")]
    ParserInit { message: String },

    /// A source file could not be parsed.
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// IO error reading a source file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CallmapError {
    /// Create a parse error for a file.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        CallmapError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        CallmapError::Internal {
            message: message.into(),
        }
    }
}

/// Result type for callmap operations.
pub type CallmapResult<T> = Result<T, CallmapError>;

// ============================================================================
// Tests
// ============================================================================
