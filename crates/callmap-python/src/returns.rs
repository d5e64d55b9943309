//! Return-type extraction.
//!
//! Walks every `return <expr>` in a file, inferring the expression type
//! with the shared rule table and merging multiple returns per function by
//! highest confidence (ties keep the earlier return, by source order).
//! Return annotations (`def f() -> T`) take precedence over inferred
//! returns.
//!
//! The extractor also reports which functions contain at least one
//! `return <expr>`, distinguishing genuinely-void functions from those
//! whose return type simply could not be inferred.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use callmap_core::{TypeInfo, TypeSource};

use crate::ast;
use crate::infer::{self, InferenceContext};
use crate::types::ReturnStatement;

// ============================================================================
// Extraction Result
// ============================================================================

/// Everything the return pass learned about one file.
#[derive(Debug, Default)]
pub struct ReturnExtraction {
    /// Every `return <expr>` with its inferred type, in source order.
    pub returns: Vec<ReturnStatement>,
    /// Merged per-function return type (annotation-first, then
    /// max-by-confidence over returns).
    pub return_types: HashMap<String, TypeInfo>,
    /// Functions containing at least one `return <expr>`.
    pub functions_with_returns: HashSet<String>,
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract return types for every function in the tree.
pub fn extract_return_types(
    root: Node<'_>,
    file: &str,
    cx: &InferenceContext<'_>,
) -> ReturnExtraction {
    let mut extraction = ReturnExtraction::default();
    visit(root, cx.module_path, file, cx, &mut extraction);
    extraction
}

/// Merge a candidate return type into the map: highest confidence wins,
/// ties keep the existing (earlier) entry.
pub fn merge_return_type(
    return_types: &mut HashMap<String, TypeInfo>,
    function_fqn: &str,
    candidate: TypeInfo,
) {
    match return_types.get(function_fqn) {
        Some(existing) if existing.confidence >= candidate.confidence => {}
        _ => {
            return_types.insert(function_fqn.to_string(), candidate);
        }
    }
}

fn visit(
    node: Node<'_>,
    enclosing_fqn: &str,
    file: &str,
    cx: &InferenceContext<'_>,
    out: &mut ReturnExtraction,
) {
    for child in ast::named_children(node) {
        match child.kind() {
            "function_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let fqn = format!("{enclosing_fqn}.{name}");

                // `def f() -> T` pins the return type ahead of inference.
                if let Some(ret_node) = child.child_by_field_name("return_type") {
                    let text = ast::node_text(ret_node, cx.source);
                    if let Some(info) = infer::resolve_annotation(text, cx) {
                        out.return_types.insert(fqn.clone(), info);
                    }
                }

                if let Some(body) = child.child_by_field_name("body") {
                    visit(body, &fqn, file, cx, out);
                }
            }
            "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let fqn = format!("{enclosing_fqn}.{name}");
                if let Some(body) = child.child_by_field_name("body") {
                    visit(body, &fqn, file, cx, out);
                }
            }
            "return_statement" => {
                let Some(expr) = child.named_child(0) else {
                    continue; // bare `return`
                };
                out.functions_with_returns.insert(enclosing_fqn.to_string());

                let Some(info) = infer::infer_expression(expr, cx) else {
                    continue;
                };
                let info = retag_for_return(info);
                out.returns.push(ReturnStatement {
                    function_fqn: enclosing_fqn.to_string(),
                    type_info: info.clone(),
                    location: ast::node_location(child, file),
                });

                // Annotations keep precedence over anything inferred.
                let annotated = out
                    .return_types
                    .get(enclosing_fqn)
                    .is_some_and(|t| t.source == TypeSource::Annotation);
                if !annotated {
                    merge_return_type(&mut out.return_types, enclosing_fqn, info);
                }
            }
            _ => visit(child, enclosing_fqn, file, cx, out),
        }
    }
}

/// Rewrite context-free source tags into their return-position forms.
fn retag_for_return(info: TypeInfo) -> TypeInfo {
    let source = match info.source {
        TypeSource::Literal => TypeSource::ReturnLiteral,
        TypeSource::Builtin => TypeSource::ReturnBuiltinConstructor,
        other => other,
    };
    info.with_source(source)
}

// ============================================================================
// Tests
// ============================================================================
