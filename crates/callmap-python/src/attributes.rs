//! Class-attribute extraction and the attribute registry.
//!
//! Walks class bodies and records:
//!
//! - every `self.<name> = <expr>` assignment seen inside any method, with
//!   a type inferred by the shared rules — unresolved class names, function
//!   calls, and typed parameters become `class:`, `call:`, and `param:`
//!   placeholders
//! - class-level annotated attributes (`class C: x: int`)
//! - every method definition, as a class-qualified FQN
//!
//! Placeholders are finished by [`resolve_placeholders`] once all return
//! types are known: `class:N`/`param:N` resolve through the file's import
//! map, then the current module, then the short-name index; `call:F`
//! resolves through the return-type map with a 0.8 confidence decay.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use callmap_core::{TypeInfo, TypeRef, TypeSource};

use crate::ast;
use crate::imports::ImportMap;
use crate::infer::{self, InferenceContext};
use crate::modules::ModuleRegistry;
use crate::types::{ClassAttribute, ClassAttributes};

// ============================================================================
// Attribute Registry
// ============================================================================

/// Per-class catalog of instance attributes and declared methods, shared
/// across the whole analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRegistry {
    classes: HashMap<String, ClassAttributes>,
}

impl AttributeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        AttributeRegistry::default()
    }

    /// Merge a class catalog into the registry.
    pub fn add_class(&mut self, class: ClassAttributes) {
        match self.classes.get_mut(&class.class_fqn) {
            Some(existing) => {
                for attr in class.attributes.into_values() {
                    existing.add_attribute(attr);
                }
                for method in class.methods {
                    if !existing.methods.contains(&method) {
                        existing.methods.push(method);
                    }
                }
            }
            None => {
                self.classes.insert(class.class_fqn.clone(), class);
            }
        }
    }

    /// Look up a class catalog by FQN.
    pub fn get(&self, class_fqn: &str) -> Option<&ClassAttributes> {
        self.classes.get(class_fqn)
    }

    /// Find the class that declares a method with this bare name.
    ///
    /// This reverse lookup recovers class context when a caller's function
    /// FQN is not class-qualified: the class whose method list contains an
    /// entry ending in `.{method_name}` is the enclosing class. Ties pick
    /// the lexicographically smallest class FQN so the answer does not
    /// depend on map iteration order.
    pub fn class_of_method(&self, method_name: &str) -> Option<&ClassAttributes> {
        let suffix = format!(".{method_name}");
        self.classes
            .values()
            .filter(|c| c.methods.iter().any(|m| m.ends_with(&suffix)))
            .min_by(|a, b| a.class_fqn.cmp(&b.class_fqn))
    }

    /// Iterate all class catalogs.
    pub fn iter(&self) -> impl Iterator<Item = &ClassAttributes> {
        self.classes.values()
    }

    /// Number of cataloged classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when no classes are cataloged.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract class attribute catalogs for every class in the tree.
///
/// Returns the catalogs plus the simple names of declared classes (for the
/// registry's short-name index).
pub fn extract_class_attributes(
    root: Node<'_>,
    file: &str,
    cx: &InferenceContext<'_>,
) -> (Vec<ClassAttributes>, Vec<String>) {
    let mut classes = Vec::new();
    let mut declared = Vec::new();
    visit(root, cx.module_path, file, cx, &mut classes, &mut declared);
    (classes, declared)
}

fn visit(
    node: Node<'_>,
    enclosing_fqn: &str,
    file: &str,
    cx: &InferenceContext<'_>,
    classes: &mut Vec<ClassAttributes>,
    declared: &mut Vec<String>,
) {
    for child in ast::named_children(node) {
        match child.kind() {
            "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let class_fqn = format!("{enclosing_fqn}.{name}");
                declared.push(name.to_string());

                let mut catalog = ClassAttributes::new(&class_fqn, file);
                if let Some(body) = child.child_by_field_name("body") {
                    collect_class_body(body, &class_fqn, cx, &mut catalog);
                    // Nested classes get their own catalogs.
                    visit(body, &class_fqn, file, cx, classes, declared);
                }
                classes.push(catalog);
            }
            "function_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let fqn = format!("{enclosing_fqn}.{name}");
                declared.push(name.to_string());
                if let Some(body) = child.child_by_field_name("body") {
                    visit(body, &fqn, file, cx, classes, declared);
                }
            }
            _ => visit(child, enclosing_fqn, file, cx, classes, declared),
        }
    }
}

fn collect_class_body(
    body: Node<'_>,
    class_fqn: &str,
    cx: &InferenceContext<'_>,
    catalog: &mut ClassAttributes,
) {
    for stmt in ast::named_children(body) {
        match stmt.kind() {
            "function_definition" => {
                let Some(name_node) = stmt.child_by_field_name("name") else {
                    continue;
                };
                let method_name = ast::node_text(name_node, cx.source);
                catalog.add_method(format!("{class_fqn}.{method_name}"));

                let typed_params = collect_typed_params(stmt, cx);
                if let Some(method_body) = stmt.child_by_field_name("body") {
                    collect_self_assignments(method_body, &typed_params, cx, catalog);
                }
            }
            "expression_statement" => {
                // Class-level annotated attribute: `x: int` / `x: int = 0`.
                let Some(assign) = stmt.named_child(0).filter(|n| n.kind() == "assignment")
                else {
                    continue;
                };
                let Some(left) = assign.child_by_field_name("left") else {
                    continue;
                };
                if left.kind() != "identifier" {
                    continue;
                }
                let Some(type_node) = assign.child_by_field_name("type") else {
                    continue;
                };
                if let Some(info) =
                    infer::resolve_annotation(ast::node_text(type_node, cx.source), cx)
                {
                    catalog.add_attribute(ClassAttribute {
                        name: ast::node_text(left, cx.source).to_string(),
                        type_info: info,
                    });
                }
            }
            "decorated_definition" => {
                collect_class_body(stmt, class_fqn, cx, catalog);
            }
            _ => {}
        }
    }
}

/// Parameter name → annotation text for a method.
fn collect_typed_params<'a>(
    func: Node<'_>,
    cx: &InferenceContext<'a>,
) -> HashMap<String, &'a str> {
    let mut typed = HashMap::new();
    let Some(params) = func.child_by_field_name("parameters") else {
        return typed;
    };
    for param in ast::named_children(params) {
        if !matches!(param.kind(), "typed_parameter" | "typed_default_parameter") {
            continue;
        }
        let name = param
            .named_child(0)
            .filter(|n| n.kind() == "identifier")
            .or_else(|| param.child_by_field_name("name"));
        let annotation = param.child_by_field_name("type");
        if let (Some(name), Some(annotation)) = (name, annotation) {
            typed.insert(
                ast::node_text(name, cx.source).to_string(),
                ast::node_text(annotation, cx.source),
            );
        }
    }
    typed
}

fn collect_self_assignments(
    node: Node<'_>,
    typed_params: &HashMap<String, &str>,
    cx: &InferenceContext<'_>,
    catalog: &mut ClassAttributes,
) {
    ast::walk(node, |n| {
        if n.kind() != "assignment" {
            // Do not descend into nested defs; their `self` is not ours.
            return !matches!(n.kind(), "function_definition" | "class_definition");
        }
        let Some(left) = n.child_by_field_name("left") else {
            return true;
        };
        if left.kind() != "attribute" {
            return true;
        }
        let receiver = left
            .child_by_field_name("object")
            .map(|o| ast::node_text(o, cx.source));
        if receiver != Some("self") {
            return true;
        }
        let Some(attr_node) = left.child_by_field_name("attribute") else {
            return true;
        };
        let attr_name = ast::node_text(attr_node, cx.source);

        // Annotated form pins the type outright.
        if let Some(type_node) = n.child_by_field_name("type") {
            if let Some(info) = infer::resolve_annotation(ast::node_text(type_node, cx.source), cx)
            {
                catalog.add_attribute(ClassAttribute {
                    name: attr_name.to_string(),
                    type_info: info,
                });
                return true;
            }
        }

        let Some(right) = n.child_by_field_name("right") else {
            return true;
        };
        if let Some(info) = infer_attribute_value(right, typed_params, cx) {
            catalog.add_attribute(ClassAttribute {
                name: attr_name.to_string(),
                type_info: info,
            });
        }
        true
    });
}

/// Infer the type of a `self.attr = <expr>` RHS, producing placeholders
/// where the shared rules would guess.
fn infer_attribute_value(
    expr: Node<'_>,
    typed_params: &HashMap<String, &str>,
    cx: &InferenceContext<'_>,
) -> Option<TypeInfo> {
    // A bare identifier that names a typed parameter: builtin and
    // imported annotations resolve now; unimported class names become
    // `param:` placeholders for the short-name pass.
    if expr.kind() == "identifier" {
        let name = ast::node_text(expr, cx.source);
        if let Some(annotation) = typed_params.get(name) {
            let outer = annotation
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .split('[')
                .next()
                .unwrap_or(annotation)
                .trim();
            if outer.is_empty() {
                return None;
            }
            let direct = cx.builtins.constructor_type(outer).is_some()
                || outer.contains('.')
                || cx.imports.contains(outer);
            if direct {
                if let Some(info) = infer::resolve_annotation(annotation, cx) {
                    return Some(info.with_source(TypeSource::Parameter));
                }
            }
            return Some(TypeInfo::new(
                TypeRef::Param(outer.to_string()),
                0.5,
                TypeSource::Parameter,
            ));
        }
        return None;
    }

    let info = infer::infer_expression(expr, cx)?;
    match info.source {
        // An unconfirmed instantiation stays a `class:` placeholder so the
        // third pass can search the module and the short-name index.
        TypeSource::ClassInstantiationHeuristic | TypeSource::ClassInstantiationGuess => {
            let simple = info
                .fqn()
                .and_then(|fqn| fqn.rsplit('.').next())
                .unwrap_or_default()
                .to_string();
            Some(TypeInfo::new(
                TypeRef::Class(simple),
                0.5,
                TypeSource::Assignment,
            ))
        }
        TypeSource::ReturnFunctionCall | TypeSource::ReturnVariable => {
            Some(info.with_source(TypeSource::Assignment))
        }
        _ => Some(info),
    }
}

// ============================================================================
// Placeholder Resolution (third pass)
// ============================================================================

/// Resolve `class:` / `param:` / `call:` attribute placeholders once every
/// file has been extracted and all return types are known.
pub fn resolve_placeholders(
    registry: &mut AttributeRegistry,
    import_maps: &HashMap<String, ImportMap>,
    modules: &ModuleRegistry,
    return_types: &HashMap<String, TypeInfo>,
) {
    for class in registry.classes.values_mut() {
        let file = class.file_path.clone();
        let module_path = modules.get_module_path(&file).map(str::to_string);
        for attr in class.attributes.values_mut() {
            let resolved = match &attr.type_info.type_ref {
                TypeRef::Class(name) => resolve_class_name(
                    name,
                    &file,
                    module_path.as_deref(),
                    import_maps,
                    modules,
                )
                .map(|(fqn, confidence, source)| TypeInfo::concrete(fqn, confidence, source)),
                TypeRef::Param(name) => resolve_class_name(
                    name,
                    &file,
                    module_path.as_deref(),
                    import_maps,
                    modules,
                )
                .map(|(fqn, _, _)| TypeInfo::concrete(fqn, 0.95, TypeSource::Parameter)),
                TypeRef::Call(func) => {
                    let fqn = match (func.contains('.'), module_path.as_deref()) {
                        (true, _) | (false, None) => func.clone(),
                        (false, Some(module)) => format!("{module}.{func}"),
                    };
                    return_types
                        .get(&fqn)
                        .filter(|t| t.is_concrete())
                        .map(|t| {
                            t.scaled(0.8)
                                .with_source(TypeSource::FunctionCallAttribute)
                        })
                }
                _ => None,
            };
            if let Some(info) = resolved {
                debug!(
                    class = %class.class_fqn,
                    attr = %attr.name,
                    type_fqn = %info.type_ref,
                    "resolved attribute placeholder"
                );
                attr.type_info = info;
            }
        }
    }
}

/// Look up a class simple name: import map first, then the current
/// module, then the short-name index. Returns `(fqn, confidence, source)`.
fn resolve_class_name(
    name: &str,
    file: &str,
    module_path: Option<&str>,
    import_maps: &HashMap<String, ImportMap>,
    modules: &ModuleRegistry,
) -> Option<(String, f32, TypeSource)> {
    if let Some(imports) = import_maps.get(file) {
        if let Some(fqn) = imports.resolve(name) {
            return Some((
                fqn.to_string(),
                0.9,
                TypeSource::ClassInstantiationImport,
            ));
        }
    }
    if let Some(module) = module_path {
        if modules
            .short_name_lookup(name)
            .iter()
            .any(|f| f == file)
        {
            return Some((
                format!("{module}.{name}"),
                0.8,
                TypeSource::ClassInstantiationLocal,
            ));
        }
    }
    let declaring = modules.short_name_lookup(name);
    if let Some(other_file) = declaring.first() {
        if let Some(other_module) = modules.get_module_path(other_file) {
            return Some((
                format!("{other_module}.{name}"),
                0.7,
                TypeSource::ClassInstantiationHeuristic,
            ));
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
