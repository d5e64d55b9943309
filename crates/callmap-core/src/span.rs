//! Byte spans and source locations.
//!
//! A [`Span`] is a half-open byte range into a source file. A [`Location`]
//! pairs a span with the owning file and 0-indexed line/column coordinates,
//! which is the form resolution results carry around instead of raw AST
//! references.

use serde::{Deserialize, Serialize};

// ============================================================================
// Span
// ============================================================================

/// A half-open byte range `[start, end)` in source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `pos` falls inside the span.
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

// ============================================================================
// Location
// ============================================================================

/// A position in a source file: file path, 0-indexed row/column, byte span.
///
/// Locations are captured at extraction time; no AST node outlives its
/// parse, so every downstream consumer works from these coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path of the source file, as registered with the module registry.
    pub file: String,
    /// 0-indexed row of the start position.
    pub row: u32,
    /// 0-indexed column of the start position.
    pub col: u32,
    /// Byte range of the underlying node.
    pub span: Span,
}

impl Location {
    /// Create a new location.
    pub fn new(file: impl Into<String>, row: u32, col: u32, span: Span) -> Self {
        Location {
            file: file.into(),
            row,
            col,
            span,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row + 1, self.col + 1)
    }
}

// ============================================================================
// Tests
// ============================================================================
