//! Expression type inference.
//!
//! One rule table, shared by the return-type extractor, the assignment
//! extractor, and the attribute extractor. Inference is local: it looks at
//! a single expression node and produces either a concrete builtin type, a
//! class-instantiation type, or a deferred placeholder for the propagation
//! phase to finish.

use callmap_core::{TypeInfo, TypeRef, TypeSource};
use tree_sitter::Node;

use crate::ast;
use crate::builtins::{self, BuiltinRegistry};
use crate::imports::ImportMap;
use crate::instantiate;
use crate::modules::ModuleRegistry;

// ============================================================================
// Context
// ============================================================================

/// Everything the rule table needs about the enclosing file.
pub struct InferenceContext<'a> {
    pub source: &'a str,
    pub module_path: &'a str,
    pub builtins: &'a BuiltinRegistry,
    pub imports: &'a ImportMap,
    pub registry: &'a ModuleRegistry,
}

// ============================================================================
// Inference
// ============================================================================

/// Infer the type of an expression node, or `None` when no rule applies.
///
/// Placeholders come back with return-flavored sources
/// ([`TypeSource::ReturnFunctionCall`] / [`TypeSource::ReturnVariable`]);
/// callers in other positions retag as needed.
pub fn infer_expression(node: Node<'_>, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    match node.kind() {
        "string" | "concatenated_string" | "integer" | "float" => {
            cx.builtins.infer_literal_type(ast::node_text(node, cx.source))
        }
        "true" | "false" => Some(TypeInfo::concrete(builtins::BOOL, 1.0, TypeSource::Literal)),
        "none" => Some(TypeInfo::concrete(builtins::NONE, 1.0, TypeSource::Literal)),
        "list" => Some(TypeInfo::concrete(builtins::LIST, 1.0, TypeSource::Literal)),
        "dictionary" => Some(TypeInfo::concrete(builtins::DICT, 1.0, TypeSource::Literal)),
        "set" => Some(TypeInfo::concrete(builtins::SET, 1.0, TypeSource::Literal)),
        "tuple" => Some(TypeInfo::concrete(builtins::TUPLE, 1.0, TypeSource::Literal)),
        "list_comprehension" => {
            Some(TypeInfo::concrete(builtins::LIST, 1.0, TypeSource::Literal))
        }
        "dictionary_comprehension" => {
            Some(TypeInfo::concrete(builtins::DICT, 1.0, TypeSource::Literal))
        }
        "set_comprehension" => Some(TypeInfo::concrete(builtins::SET, 1.0, TypeSource::Literal)),
        "generator_expression" => {
            Some(TypeInfo::concrete(builtins::GENERATOR, 1.0, TypeSource::Literal))
        }
        "call" => infer_call(node, cx),
        "identifier" => {
            let name = ast::node_text(node, cx.source);
            if name.is_empty() {
                return None;
            }
            Some(TypeInfo::new(
                TypeRef::Var(name.to_string()),
                0.2,
                TypeSource::ReturnVariable,
            ))
        }
        "comparison_operator" | "not_operator" => {
            Some(TypeInfo::concrete(builtins::BOOL, 1.0, TypeSource::Literal))
        }
        "boolean_operator" => infer_boolean_operator(node, cx),
        "conditional_expression" => infer_conditional(node, cx),
        "parenthesized_expression" => {
            let inner = node.named_child(0)?;
            infer_expression(inner, cx)
        }
        "unary_operator" => infer_unary(node, cx),
        _ => None,
    }
}

/// Resolve a callee to its FQN by translating the head through the
/// import map; unimported callees come back as written.
pub fn resolve_callee_fqn(callee: &str, imports: &ImportMap) -> String {
    match callee.split_once('.') {
        Some((head, rest)) => match imports.resolve(head) {
            Some(head_fqn) => format!("{head_fqn}.{rest}"),
            None => callee.to_string(),
        },
        None => imports
            .resolve(callee)
            .map(str::to_string)
            .unwrap_or_else(|| callee.to_string()),
    }
}

/// Resolve a type annotation's text to a concrete type.
///
/// Handles builtin names, `None`, quoted forward references, subscripted
/// generics (`List[str]` resolves to the outer container), imported names,
/// and unimported PascalCase names assumed local to the module.
pub fn resolve_annotation(text: &str, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    let mut name = text.trim();
    name = name.trim_matches(|c| c == '"' || c == '\'');
    if let Some(bracket) = name.find('[') {
        name = name[..bracket].trim_end();
    }
    if name.is_empty() {
        return None;
    }

    if name == "None" {
        return Some(TypeInfo::concrete(builtins::NONE, 1.0, TypeSource::Annotation));
    }
    if let Some(fqn) = cx.builtins.constructor_type(name) {
        return Some(TypeInfo::concrete(fqn, 1.0, TypeSource::Annotation));
    }
    match name {
        "List" => return Some(TypeInfo::concrete(builtins::LIST, 1.0, TypeSource::Annotation)),
        "Dict" => return Some(TypeInfo::concrete(builtins::DICT, 1.0, TypeSource::Annotation)),
        "Set" => return Some(TypeInfo::concrete(builtins::SET, 1.0, TypeSource::Annotation)),
        "Tuple" => return Some(TypeInfo::concrete(builtins::TUPLE, 1.0, TypeSource::Annotation)),
        "Optional" | "Any" | "Union" | "Callable" => return None,
        _ => {}
    }

    if name.contains('.') {
        let fqn = resolve_callee_fqn(name, cx.imports);
        return Some(TypeInfo::concrete(fqn, 0.9, TypeSource::Annotation));
    }
    if let Some(fqn) = cx.imports.resolve(name) {
        return Some(TypeInfo::concrete(fqn, 0.95, TypeSource::Annotation));
    }
    if instantiate::is_pascal_case(name) {
        return Some(TypeInfo::concrete(
            format!("{}.{name}", cx.module_path),
            0.9,
            TypeSource::Annotation,
        ));
    }
    None
}

fn infer_call(node: Node<'_>, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    let callee_node = node.child_by_field_name("function")?;
    let callee = ast::node_text(callee_node, cx.source);
    if callee.is_empty() {
        return None;
    }

    // PascalCase (possibly dotted): class instantiation.
    if instantiate::is_instantiation_target(callee) {
        if let Some(info) =
            instantiate::resolve_instantiation(callee, cx.module_path, cx.imports, cx.registry)
        {
            return Some(info);
        }
    }

    // Lowercase builtin constructor: list(), str(), …
    if let Some(fqn) = cx.builtins.constructor_type(callee) {
        return Some(TypeInfo::concrete(fqn, 0.9, TypeSource::Builtin));
    }

    // Well-known stdlib callable with a stable return type.
    let callee_fqn = resolve_callee_fqn(callee, cx.imports);
    if let Some(ret) = cx.builtins.stdlib_return(&callee_fqn) {
        return Some(TypeInfo::concrete(ret, 0.9, TypeSource::Stdlib));
    }

    // Anything else defers to propagation.
    Some(TypeInfo::new(
        TypeRef::Call(callee.to_string()),
        0.3,
        TypeSource::ReturnFunctionCall,
    ))
}

fn infer_boolean_operator(node: Node<'_>, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    let left = node
        .child_by_field_name("left")
        .and_then(|n| infer_expression(n, cx))
        .filter(TypeInfo::is_concrete);
    let right = node
        .child_by_field_name("right")
        .and_then(|n| infer_expression(n, cx))
        .filter(TypeInfo::is_concrete);

    match (left, right) {
        (Some(l), Some(r)) if l.type_ref == r.type_ref => {
            let confidence = l.confidence.min(r.confidence) * 0.9;
            Some(TypeInfo::new(l.type_ref, confidence, l.source))
        }
        // Operands disagree: no single type describes the result.
        (Some(_), Some(_)) => None,
        (Some(one), None) | (None, Some(one)) => Some(one.scaled(0.7)),
        (None, None) => None,
    }
}

fn infer_conditional(node: Node<'_>, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    // Grammar shape: `consequence if condition else alternative`.
    let consequence = node.named_child(0).and_then(|n| infer_expression(n, cx));
    let alternative = node.named_child(2).and_then(|n| infer_expression(n, cx));

    match (consequence, alternative) {
        (Some(a), Some(b)) if a.type_ref == b.type_ref => {
            let base = if a.confidence >= b.confidence { a } else { b };
            Some(base.scaled(0.9))
        }
        (Some(a), Some(b)) => {
            let higher = if a.confidence >= b.confidence { a } else { b };
            Some(higher.scaled(0.6))
        }
        (Some(one), None) | (None, Some(one)) => Some(one.scaled(0.6)),
        (None, None) => None,
    }
}

fn infer_unary(node: Node<'_>, cx: &InferenceContext<'_>) -> Option<TypeInfo> {
    let operand = node
        .child_by_field_name("argument")
        .or_else(|| node.named_child(0))
        .and_then(|n| infer_expression(n, cx));
    match operand {
        Some(info)
            if matches!(info.fqn(), Some(builtins::INT) | Some(builtins::FLOAT)) =>
        {
            Some(info)
        }
        _ => Some(TypeInfo::concrete(builtins::INT, 0.5, TypeSource::Heuristic)),
    }
}

// ============================================================================
// Tests
// ============================================================================
