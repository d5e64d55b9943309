//! Assignment extraction: initial variable bindings per function scope.
//!
//! Builds one [`FunctionScope`] per function (plus one for module-level
//! code, keyed by the module path) holding every simple assignment with
//! an inferred or placeholder type. Reassignments accumulate as binding
//! history; nothing is overwritten.
//!
//! Also records annotated parameters (`def f(x: Handler)`) and the
//! implicit `self`/`cls` binding inside methods, both of which seed
//! receiver types for instance-call resolution.

use std::collections::HashMap;

use tree_sitter::Node;

use callmap_core::{TypeInfo, TypeSource};

use crate::ast;
use crate::infer::{self, InferenceContext};
use crate::types::{FunctionScope, VariableBinding};

// ============================================================================
// Extraction
// ============================================================================

/// Extract variable bindings for every scope in the tree.
///
/// Returns scopes keyed by function FQN; module-level bindings live under
/// the module path itself.
pub fn extract_bindings(
    root: Node<'_>,
    file: &str,
    cx: &InferenceContext<'_>,
) -> HashMap<String, FunctionScope> {
    let mut scopes = HashMap::new();
    visit(root, cx.module_path, None, file, cx, &mut scopes);
    scopes
}

fn scope_entry<'a>(
    scopes: &'a mut HashMap<String, FunctionScope>,
    fqn: &str,
) -> &'a mut FunctionScope {
    scopes
        .entry(fqn.to_string())
        .or_insert_with(|| FunctionScope::new(fqn))
}

fn visit(
    node: Node<'_>,
    enclosing_fqn: &str,
    enclosing_class: Option<&str>,
    file: &str,
    cx: &InferenceContext<'_>,
    scopes: &mut HashMap<String, FunctionScope>,
) {
    for child in ast::named_children(node) {
        match child.kind() {
            "function_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let fqn = format!("{enclosing_fqn}.{name}");

                collect_parameters(child, &fqn, enclosing_class, file, cx, scopes);

                if let Some(body) = child.child_by_field_name("body") {
                    // Functions nested inside a method lose the implicit
                    // self binding; only direct class children keep it.
                    visit(body, &fqn, None, file, cx, scopes);
                }
            }
            "class_definition" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = ast::node_text(name_node, cx.source);
                let fqn = format!("{enclosing_fqn}.{name}");
                if let Some(body) = child.child_by_field_name("body") {
                    visit(body, &fqn, Some(&fqn), file, cx, scopes);
                }
            }
            "assignment" => {
                collect_assignment(child, enclosing_fqn, file, cx, scopes);
            }
            _ => visit(child, enclosing_fqn, enclosing_class, file, cx, scopes),
        }
    }
}

fn collect_parameters(
    func: Node<'_>,
    function_fqn: &str,
    enclosing_class: Option<&str>,
    file: &str,
    cx: &InferenceContext<'_>,
    scopes: &mut HashMap<String, FunctionScope>,
) {
    let Some(params) = func.child_by_field_name("parameters") else {
        return;
    };
    let mut first = true;
    for param in ast::named_children(params) {
        let (name_node, annotation) = match param.kind() {
            "identifier" => (Some(param), None),
            "typed_parameter" | "typed_default_parameter" => (
                param
                    .named_child(0)
                    .filter(|n| n.kind() == "identifier")
                    .or_else(|| param.child_by_field_name("name")),
                param.child_by_field_name("type"),
            ),
            "default_parameter" => (param.child_by_field_name("name"), None),
            _ => (None, None),
        };
        let Some(name_node) = name_node else {
            first = false;
            continue;
        };
        let name = ast::node_text(name_node, cx.source);

        // Implicit receiver: `self`/`cls` in a method is the class itself.
        if first && (name == "self" || name == "cls") {
            if let Some(class_fqn) = enclosing_class {
                let info = TypeInfo::concrete(class_fqn, 0.9, TypeSource::Parameter);
                scope_entry(scopes, function_fqn).add_binding(VariableBinding::new(
                    name,
                    info,
                    ast::node_location(name_node, file),
                ));
            }
            first = false;
            continue;
        }
        first = false;

        let Some(annotation) = annotation else {
            continue;
        };
        let text = ast::node_text(annotation, cx.source);
        if let Some(info) = infer::resolve_annotation(text, cx) {
            let info = info.with_source(TypeSource::Parameter);
            scope_entry(scopes, function_fqn).add_binding(VariableBinding::new(
                name,
                info,
                ast::node_location(name_node, file),
            ));
        }
    }
}

fn collect_assignment(
    node: Node<'_>,
    enclosing_fqn: &str,
    file: &str,
    cx: &InferenceContext<'_>,
    scopes: &mut HashMap<String, FunctionScope>,
) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    // `self.attr = …` belongs to the attribute extractor; tuple targets
    // and subscripts carry no single binding.
    if left.kind() != "identifier" {
        if let Some(right) = node.child_by_field_name("right") {
            if right.kind() == "assignment" {
                collect_assignment(right, enclosing_fqn, file, cx, scopes);
            }
        }
        return;
    }
    let name = ast::node_text(left, cx.source);

    // Annotated assignment pins the type; otherwise infer from the RHS,
    // unwrapping chained assignments (`a = b = expr`).
    let info = if let Some(type_node) = node.child_by_field_name("type") {
        infer::resolve_annotation(ast::node_text(type_node, cx.source), cx)
    } else {
        let mut rhs = node.child_by_field_name("right");
        while let Some(r) = rhs {
            if r.kind() == "assignment" {
                // Bind the inner target too, then keep unwrapping.
                collect_assignment(r, enclosing_fqn, file, cx, scopes);
                rhs = r.child_by_field_name("right");
            } else {
                break;
            }
        }
        rhs.and_then(|r| infer::infer_expression(r, cx))
            .map(retag_for_assignment)
    };

    let Some(info) = info else {
        return;
    };
    scope_entry(scopes, enclosing_fqn).add_binding(VariableBinding::new(
        name,
        info,
        ast::node_location(left, file),
    ));
}

/// Placeholders picked up in assignment position carry the `assignment`
/// tag until propagation replaces them.
fn retag_for_assignment(info: TypeInfo) -> TypeInfo {
    match info.source {
        TypeSource::ReturnFunctionCall | TypeSource::ReturnVariable => {
            info.with_source(TypeSource::Assignment)
        }
        _ => info,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PythonParser;
    use crate::builtins::{self, BuiltinRegistry};
    use crate::modules::ModuleRegistry;
    use callmap_core::TypeRef;

    fn extract(source: &str) -> HashMap<String, FunctionScope> {
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse(source, "app.py").unwrap();
        let builtins = BuiltinRegistry::new();
        let registry = ModuleRegistry::new();
        let imports = crate::imports::extract_imports(tree.root_node(), source, "app", &registry);
        let cx = InferenceContext {
            source,
            module_path: "app",
            builtins: &builtins,
            imports: &imports,
            registry: &registry,
        };
        extract_bindings(tree.root_node(), "app.py", &cx)
    }

    #[test]
    fn test_module_level_bindings_use_module_scope() {
        let scopes = extract("name = \"alice\"\ncount = 3\n");
        let scope = &scopes["app"];
        assert_eq!(
            scope.current_binding("name").unwrap().type_info.fqn(),
            Some(builtins::STR)
        );
        assert_eq!(
            scope.current_binding("count").unwrap().type_info.fqn(),
            Some(builtins::INT)
        );
    }

    #[test]
    fn test_function_scope_and_placeholder_binding() {
        let source = "\
def login():
    u = make_user()
    return u
";
        let scopes = extract(source);
        let scope = &scopes["app.login"];
        let binding = scope.current_binding("u").unwrap();
        assert_eq!(binding.type_info.type_ref, TypeRef::Call("make_user".to_string()));
        assert_eq!(binding.type_info.source, TypeSource::Assignment);
    }

    #[test]
    fn test_reassignment_history_retained() {
        let source = "\
def work():
    x = \"s\"
    x = 42
";
        let scopes = extract(source);
        let history = &scopes["app.work"].variables["x"];
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].type_info.fqn(), Some(builtins::STR));
        assert_eq!(history[1].type_info.fqn(), Some(builtins::INT));
    }

    #[test]
    fn test_chained_assignment_binds_all_targets() {
        let scopes = extract("def init():\n    a = b = []\n");
        let scope = &scopes["app.init"];
        assert_eq!(
            scope.current_binding("a").unwrap().type_info.fqn(),
            Some(builtins::LIST)
        );
        assert_eq!(
            scope.current_binding("b").unwrap().type_info.fqn(),
            Some(builtins::LIST)
        );
    }

    #[test]
    fn test_annotated_assignment_and_parameter() {
        let source = "\
from myapp.handlers import Handler

def process(h: Handler, verbose=False):
    result: str = h.run()
";
        let scopes = extract(source);
        let scope = &scopes["app.process"];
        let param = scope.current_binding("h").unwrap();
        assert_eq!(param.type_info.fqn(), Some("myapp.handlers.Handler"));
        assert_eq!(param.type_info.source, TypeSource::Parameter);
        let annotated = scope.current_binding("result").unwrap();
        assert_eq!(annotated.type_info.fqn(), Some(builtins::STR));
        assert_eq!(annotated.type_info.source, TypeSource::Annotation);
        // Untyped default parameter records nothing.
        assert!(scope.current_binding("verbose").is_none());
    }

    #[test]
    fn test_implicit_self_binding_in_methods() {
        let source = "\
class Service:
    def start(self):
        pass

def free(self):
    pass
";
        let scopes = extract(source);
        let binding = scopes["app.Service.start"].current_binding("self").unwrap();
        assert_eq!(binding.type_info.fqn(), Some("app.Service"));
        assert_eq!(binding.type_info.source, TypeSource::Parameter);
        // `self` outside a class is just an untyped parameter name.
        assert!(!scopes.contains_key("app.free"));
    }

    #[test]
    fn test_self_attribute_assignment_is_not_a_variable_binding() {
        let source = "\
class Service:
    def __init__(self):
        self.handler = Handler()
";
        let scopes = extract(source);
        let scope = &scopes["app.Service.__init__"];
        assert!(scope.current_binding("handler").is_none());
        assert!(scope.current_binding("self.handler").is_none());
    }
}
