//! Call-site extraction.
//!
//! Walks the AST for `call` nodes and captures their textual targets,
//! locations, and argument shapes. Nested calls each get their own site
//! (`f().g()` is two calls). AST nodes do not survive extraction; only
//! text and positions are carried forward.

use tree_sitter::Node;

use crate::ast;
use crate::types::{CallArgument, CallSite};

/// Extract every call site in the tree, tagged with its enclosing
/// function FQN (the module path for top-level calls).
pub fn extract_call_sites(
    root: Node<'_>,
    source: &str,
    module_path: &str,
    file: &str,
) -> Vec<CallSite> {
    let mut sites = Vec::new();
    visit(root, module_path, source, file, &mut sites);
    sites
}

fn visit(
    node: Node<'_>,
    enclosing_fqn: &str,
    source: &str,
    file: &str,
    sites: &mut Vec<CallSite>,
) {
    for child in ast::named_children(node) {
        match child.kind() {
            "function_definition" | "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, source);
                let fqn = format!("{enclosing_fqn}.{name}");
                if let Some(body) = child.child_by_field_name("body") {
                    visit(body, &fqn, source, file, sites);
                }
            }
            "call" => {
                if let Some(site) = build_site(child, enclosing_fqn, source, file) {
                    sites.push(site);
                }
                // Nested calls (receiver expressions, arguments) are
                // sites of their own.
                visit(child, enclosing_fqn, source, file, sites);
            }
            _ => visit(child, enclosing_fqn, source, file, sites),
        }
    }
}

fn build_site(
    call: Node<'_>,
    enclosing_fqn: &str,
    source: &str,
    file: &str,
) -> Option<CallSite> {
    let function = call.child_by_field_name("function")?;
    let target = ast::node_text(function, source);
    if target.is_empty() {
        return None;
    }

    let arguments = call
        .child_by_field_name("arguments")
        .map(|args| {
            ast::named_children(args)
                .into_iter()
                .map(|arg| CallArgument {
                    text: ast::node_text(arg, source).to_string(),
                    is_identifier: arg.kind() == "identifier",
                })
                .collect()
        })
        .unwrap_or_default();

    Some(
        CallSite::new(target, enclosing_fqn, ast::node_location(call, file))
            .with_arguments(arguments),
    )
}

// ============================================================================
// Tests
// ============================================================================
