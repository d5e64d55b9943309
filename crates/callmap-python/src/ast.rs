//! Thin wrapper over the tree-sitter Python grammar.
//!
//! Everything the rest of the crate needs from the parser goes through
//! here: parsing a source string, reading node text, converting node
//! positions to [`Location`]s, and preorder traversal. No other module
//! holds a tree-sitter type across a phase boundary; extraction captures
//! textual targets and locations instead.

use callmap_core::{CallmapError, CallmapResult, Location, Span};
use tree_sitter::{Node, Parser, Tree};

// ============================================================================
// Parser
// ============================================================================

/// A reusable Python parser.
///
/// One parser per extraction worker; `Parser` is not `Sync`, so Phase A
/// creates one per rayon task rather than sharing.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    /// Create a parser with the Python grammar loaded.
    pub fn new() -> CallmapResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| CallmapError::ParserInit {
                message: e.to_string(),
            })?;
        Ok(PythonParser { parser })
    }

    /// Parse `source`, surfacing a parse error tagged with `file`.
    ///
    /// Trees containing localized syntax errors are still returned;
    /// extraction degrades gracefully around error nodes. Only a wholesale
    /// parse failure becomes an `Err`.
    pub fn parse(&mut self, source: &str, file: &str) -> CallmapResult<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| CallmapError::parse(file, "tree-sitter returned no tree"))
    }
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Source text of a node. Returns an empty string for invalid UTF-8 ranges.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Location of a node within `file`.
pub fn node_location(node: Node<'_>, file: &str) -> Location {
    let start = node.start_position();
    let range = node.byte_range();
    Location::new(
        file,
        start.row as u32,
        start.column as u32,
        Span::new(range.start, range.end),
    )
}

/// Preorder traversal over every node in the tree, including unnamed ones.
///
/// The callback returns whether to descend into the node's children.
pub fn walk<F>(root: Node<'_>, mut visit: F)
where
    F: FnMut(Node<'_>) -> bool,
{
    let mut cursor = root.walk();
    let mut done = false;
    while !done {
        let descend = visit(cursor.node());
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                done = true;
                break;
            }
        }
    }
}

/// Named children of a node, collected.
pub fn named_children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

// ============================================================================
// Tests
// ============================================================================
