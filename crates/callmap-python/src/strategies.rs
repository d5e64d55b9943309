//! Call-site resolution strategies.
//!
//! Each strategy declares a priority and a capability predicate; the call
//! graph builder consults them highest-priority first and falls through to
//! the next on failure:
//!
//! | priority | strategy |
//! |----------|----------|
//! | 90 | self-attribute (`self.attr.method`, incl. deep chains) |
//! | 85 | chain (`f().g().h`) |
//! | 80 | instance call (`var.method`) |
//! | 70 | attribute access (`module.func`, `Cls.method`) |
//! | 60 | framework pattern (`Model.objects.filter`) |
//! |  0 | fallback (bare identifiers and literals) |
//!
//! The registry form keeps the recognizer set open: a new framework is a
//! new strategy (or pattern), not a rewrite of a match statement.

use callmap_core::{CodeGraph, FailureReason, TypeInfo, TypeSource};
use tracing::trace;

use crate::attributes::AttributeRegistry;
use crate::builtins::BuiltinRegistry;
use crate::chains::{self, ChainContext};
use crate::engine::InferenceEngine;
use crate::frameworks;
use crate::instantiate;
use crate::types::{CallSite, Resolution};

// ============================================================================
// Strategy Trait
// ============================================================================

/// Shared read-only collaborators for resolution.
pub struct ResolutionContext<'a> {
    pub engine: &'a InferenceEngine,
    pub builtins: &'a BuiltinRegistry,
    pub attributes: &'a AttributeRegistry,
    pub code_graph: &'a CodeGraph,
}

/// A resolution procedure for one call-site shape.
pub trait ResolutionStrategy: Send + Sync {
    /// Stable name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Dispatch priority; higher is consulted first.
    fn priority(&self) -> u8;

    /// Whether this strategy recognizes the call site's shape.
    fn can_handle(&self, site: &CallSite) -> bool;

    /// Attempt resolution. An `Err` sends dispatch to the next strategy.
    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason>;
}

/// The default strategy set, sorted by descending priority.
pub fn default_strategies() -> Vec<Box<dyn ResolutionStrategy>> {
    let mut strategies: Vec<Box<dyn ResolutionStrategy>> = vec![
        Box::new(SelfAttributeStrategy),
        Box::new(ChainStrategy),
        Box::new(InstanceCallStrategy),
        Box::new(AttributeAccessStrategy),
        Box::new(FrameworkPatternStrategy),
        Box::new(FallbackStrategy),
    ];
    strategies.sort_by(|a, b| b.priority().cmp(&a.priority()));
    strategies
}

fn dot_count(target: &str) -> usize {
    target.bytes().filter(|b| *b == b'.').count()
}

// ============================================================================
// Self-Attribute Strategy (priority 90)
// ============================================================================

/// Resolves `self.attr.method` and deeper `self.a.b.c.method` targets by
/// walking the attribute registry.
pub struct SelfAttributeStrategy;

impl SelfAttributeStrategy {
    /// Recover the caller's class: the caller FQN's parent when that is a
    /// cataloged class, otherwise a reverse lookup for a class declaring
    /// a method with the caller's bare name.
    fn enclosing_class<'a>(
        caller_fqn: &str,
        cx: &ResolutionContext<'a>,
    ) -> Option<&'a crate::types::ClassAttributes> {
        if let Some((parent, _)) = caller_fqn.rsplit_once('.') {
            if let Some(class) = cx.attributes.get(parent) {
                return Some(class);
            }
        }
        let bare = caller_fqn.rsplit('.').next()?;
        cx.attributes.class_of_method(bare)
    }
}

impl ResolutionStrategy for SelfAttributeStrategy {
    fn name(&self) -> &'static str {
        "self_attribute"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        site.target.starts_with("self.")
            && dot_count(&site.target) >= 2
            && !site.target.contains('(')
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let segments: Vec<&str> = site.target.split('.').collect();
        if segments.first() != Some(&"self") || segments.len() < 3 {
            return Err(FailureReason::NotSelfPrefix);
        }
        let attrs = &segments[1..segments.len() - 1];
        let method = segments[segments.len() - 1];

        let max_depth = cx.engine.config().attribute_chain_max_depth;
        if attrs.len() > max_depth {
            return Err(FailureReason::DeepChain);
        }

        let class = Self::enclosing_class(&site.caller_fqn, cx)
            .ok_or(FailureReason::ClassNotFound)?;

        // Walk the attribute steps, combining confidences.
        let mut current_fqn = class.class_fqn.clone();
        let mut confidence = 1.0f32;
        for attr_name in attrs {
            let catalog = cx
                .attributes
                .get(&current_fqn)
                .ok_or(FailureReason::AttributeNotFound)?;
            let attr = catalog
                .attribute(attr_name)
                .ok_or(FailureReason::AttributeNotFound)?;
            match attr.type_info.fqn() {
                Some(fqn) => {
                    confidence *= attr.type_info.confidence;
                    current_fqn = fqn.to_string();
                }
                // Placeholder survived the resolution pass; a later
                // iteration may still supply the missing return type.
                None => return Err(FailureReason::ReceiverPlaceholder),
            }
        }

        // Terminal step: the method on the final attribute type.
        if cx.builtins.is_builtin(&current_fqn) {
            let found = cx
                .builtins
                .get_method(&current_fqn, method)
                .ok_or(FailureReason::MethodNotInBuiltins)?;
            let target_fqn = format!("{current_fqn}.{method}");
            let type_info = TypeInfo::concrete(
                found.return_type_fqn.clone(),
                confidence,
                TypeSource::SelfAttribute,
            );
            return Ok(Resolution::new(target_fqn, type_info));
        }

        let target_fqn = format!("{current_fqn}.{method}");
        if cx.code_graph.is_callable(&target_fqn) {
            // The result type reflects the method's host; callers needing
            // the return type re-query the engine's return map.
            let type_info = TypeInfo::concrete(
                current_fqn,
                confidence,
                TypeSource::SelfAttributeCustomClass,
            );
            return Ok(Resolution::new(target_fqn, type_info));
        }
        Err(FailureReason::CustomClassUnsupported)
    }
}

// ============================================================================
// Chain Strategy (priority 85)
// ============================================================================

/// Resolves call-then-attribute chains via the chain walker.
pub struct ChainStrategy;

impl ResolutionStrategy for ChainStrategy {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn priority(&self) -> u8 {
        85
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        site.is_chain()
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let chain_cx = ChainContext {
            engine: cx.engine,
            builtins: cx.builtins,
            code_graph: cx.code_graph,
        };
        chains::resolve_chain(
            &site.target,
            &site.caller_fqn,
            Some(site.location.row),
            &chain_cx,
        )
    }
}

// ============================================================================
// Instance-Call Strategy (priority 80)
// ============================================================================

/// Resolves `var.method` where `var` is a typed variable in scope (the
/// implicit `self` binding included).
pub struct InstanceCallStrategy;

impl ResolutionStrategy for InstanceCallStrategy {
    fn name(&self) -> &'static str {
        "instance_call"
    }

    fn priority(&self) -> u8 {
        80
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        dot_count(&site.target) == 1 && !site.target.contains('(')
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let (receiver, method) = site
            .target
            .split_once('.')
            .ok_or(FailureReason::ClassNotFound)?;

        let binding = cx
            .engine
            .lookup_variable(&site.caller_fqn, receiver, Some(site.location.row))
            .ok_or(FailureReason::ClassNotFound)?;
        let Some(receiver_fqn) = binding.type_info.fqn() else {
            return Err(FailureReason::ReceiverPlaceholder);
        };

        if cx.builtins.is_builtin(receiver_fqn) {
            let found = cx
                .builtins
                .get_method(receiver_fqn, method)
                .ok_or(FailureReason::MethodNotInBuiltins)?;
            let target_fqn = format!("{receiver_fqn}.{method}");
            let type_info = TypeInfo::concrete(
                found.return_type_fqn.clone(),
                binding.type_info.confidence,
                TypeSource::Builtin,
            );
            return Ok(Resolution::new(target_fqn, type_info));
        }

        let target_fqn = format!("{receiver_fqn}.{method}");
        let declared = cx.code_graph.is_callable(&target_fqn);
        let return_type = cx.engine.return_type(&target_fqn);
        if !declared && return_type.is_none() {
            return Err(FailureReason::CustomClassUnsupported);
        }

        let factor = cx.engine.config().confidence_propagation_factor;
        let type_info = match return_type.filter(TypeInfo::is_concrete) {
            Some(ret) => TypeInfo::new(
                ret.type_ref,
                ret.confidence * binding.type_info.confidence * factor,
                binding.type_info.source,
            ),
            None => TypeInfo::concrete(
                receiver_fqn,
                binding.type_info.confidence * factor,
                binding.type_info.source,
            ),
        };
        Ok(Resolution::new(target_fqn, type_info))
    }
}

// ============================================================================
// Attribute-Access Strategy (priority 70)
// ============================================================================

/// Resolves dotted access that is not instance-shaped: imported module
/// functions (`models.create`), class-level access (`Cls.method`), and
/// deeper module paths. Declines ORM shapes so the framework strategy
/// sees them first among the remaining candidates.
pub struct AttributeAccessStrategy;

impl ResolutionStrategy for AttributeAccessStrategy {
    fn name(&self) -> &'static str {
        "attribute_access"
    }

    fn priority(&self) -> u8 {
        70
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        dot_count(&site.target) >= 1
            && !site.target.contains('(')
            && !site.target.starts_with("self.")
            && !frameworks::is_framework_pattern(&site.target)
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let qualified = cx.engine.qualify_callee(&site.target, &site.caller_fqn);

        let declared = cx.code_graph.is_callable(&qualified);
        let return_type = cx.engine.return_type(&qualified);
        if declared || return_type.is_some() {
            let was_imported = qualified != site.target;
            let confidence = if was_imported { 0.9 } else { 0.7 };
            let type_info = match return_type.filter(TypeInfo::is_concrete) {
                Some(ret) => TypeInfo::new(
                    ret.type_ref,
                    ret.confidence * confidence,
                    TypeSource::FunctionCallAttribute,
                ),
                None => TypeInfo::concrete(
                    qualified.clone(),
                    confidence,
                    TypeSource::FunctionCallAttribute,
                ),
            };
            return Ok(Resolution::new(qualified, type_info));
        }

        // Stdlib callables resolve even without declarations.
        if let Some(ret) = cx.builtins.stdlib_return(&qualified) {
            let type_info = TypeInfo::concrete(ret, 0.9, TypeSource::Stdlib);
            return Ok(Resolution::new(qualified, type_info));
        }

        Err(FailureReason::AttributeNotFound)
    }
}

// ============================================================================
// Framework-Pattern Strategy (priority 60)
// ============================================================================

/// Resolves ORM manager and query-attribute patterns.
pub struct FrameworkPatternStrategy;

impl ResolutionStrategy for FrameworkPatternStrategy {
    fn name(&self) -> &'static str {
        "framework_pattern"
    }

    fn priority(&self) -> u8 {
        60
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        frameworks::is_framework_pattern(&site.target)
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let module = cx.engine.module_path_of(&site.caller_fqn);
        frameworks::resolve_framework_pattern(&site.target, &module, cx.code_graph)
            .ok_or(FailureReason::AttributeNotFound)
    }
}

// ============================================================================
// Fallback Strategy (priority 0)
// ============================================================================

/// Handles bare identifiers and literals so no call site gets "no
/// answer" — only an explicit unknown.
pub struct FallbackStrategy;

impl ResolutionStrategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn priority(&self) -> u8 {
        0
    }

    fn can_handle(&self, site: &CallSite) -> bool {
        !site.target.contains('.') && !site.target.contains('(')
    }

    fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> Result<Resolution, FailureReason> {
        let target = site.target.as_str();

        // A literal in call position types itself.
        if let Some(info) = cx.builtins.infer_literal_type(target) {
            let fqn = info.fqn().unwrap_or_default().to_string();
            return Ok(Resolution::new(fqn, info));
        }

        // Builtin constructor call: `list`, `dict`, …
        if let Some(fqn) = cx.builtins.constructor_type(target) {
            let info = TypeInfo::concrete(fqn, 0.9, TypeSource::Builtin);
            return Ok(Resolution::new(fqn, info));
        }

        // Class instantiation by simple name.
        let module = cx.engine.module_path_of(&site.caller_fqn);
        if instantiate::is_pascal_case(target) {
            let imports = cx
                .engine
                .modules()
                .get_file(&module)
                .and_then(|file| cx.engine.import_map(file))
                .unwrap_or_default();
            if let Some(info) =
                instantiate::resolve_instantiation(target, &module, &imports, cx.engine.modules())
            {
                let fqn = info.fqn().unwrap_or_default().to_string();
                return Ok(Resolution::new(fqn, info));
            }
        }

        // Plain function: imports first, then the enclosing module.
        let qualified = cx.engine.qualify_callee(target, &site.caller_fqn);
        let declared = cx.code_graph.is_callable(&qualified);
        let return_type = cx.engine.return_type(&qualified);
        if declared || return_type.is_some() {
            let confidence = if declared { 0.9 } else { 0.8 };
            let type_info = match return_type.filter(TypeInfo::is_concrete) {
                Some(ret) => TypeInfo::new(ret.type_ref, ret.confidence * confidence, ret.source),
                None => TypeInfo::concrete(qualified.clone(), confidence, TypeSource::Assignment),
            };
            return Ok(Resolution::new(qualified, type_info));
        }

        // Explicit unknown: an answer, not an edge.
        trace!(target = %site.target, "fallback produced unknown type");
        Ok(Resolution::new(qualified, TypeInfo::unknown()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::ImportMap;
    use crate::modules::ModuleRegistry;
    use crate::returns::ReturnExtraction;
    use crate::types::{ClassAttribute, ClassAttributes, FunctionScope, VariableBinding};
    use callmap_core::{AnalysisConfig, GraphNode, Location, NodeKind, Span};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn loc(row: u32) -> Location {
        Location::new("app.py", row, 0, Span::new(0, 0))
    }

    fn site(target: &str, caller: &str) -> CallSite {
        CallSite::new(target, caller, loc(5))
    }

    struct Fixture {
        engine: InferenceEngine,
        builtins: BuiltinRegistry,
        attributes: AttributeRegistry,
        code_graph: CodeGraph,
    }

    impl Fixture {
        fn new() -> Self {
            let mut modules = ModuleRegistry::new();
            modules.add_module("app", "app.py");
            Fixture {
                engine: InferenceEngine::new(AnalysisConfig::default(), Arc::new(modules)),
                builtins: BuiltinRegistry::new(),
                attributes: AttributeRegistry::new(),
                code_graph: CodeGraph::new(),
            }
        }

        fn cx(&self) -> ResolutionContext<'_> {
            ResolutionContext {
                engine: &self.engine,
                builtins: &self.builtins,
                attributes: &self.attributes,
                code_graph: &self.code_graph,
            }
        }
    }

    #[test]
    fn test_priorities_are_descending() {
        let strategies = default_strategies();
        let priorities: Vec<u8> = strategies.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![90, 85, 80, 70, 60, 0]);
    }

    #[test]
    fn test_self_attribute_builtin() {
        // S4: class StringBuilder with value: str; self.value.upper.
        let mut fixture = Fixture::new();
        let mut class = ClassAttributes::new("app.StringBuilder", "app.py");
        class.add_attribute(ClassAttribute {
            name: "value".to_string(),
            type_info: TypeInfo::concrete("builtins.str", 1.0, TypeSource::Annotation),
        });
        class.add_method("app.StringBuilder.process");
        fixture.attributes.add_class(class);

        let strategy = SelfAttributeStrategy;
        let site = site("self.value.upper", "app.StringBuilder.process");
        assert!(strategy.can_handle(&site));
        let resolution = strategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "builtins.str.upper");
        assert_eq!(resolution.type_info.fqn(), Some("builtins.str"));
        assert!((resolution.type_info.confidence - 1.0).abs() < 1e-6);
        assert_eq!(resolution.type_info.source, TypeSource::SelfAttribute);
    }

    #[test]
    fn test_self_attribute_reverse_class_lookup() {
        // Caller FQN is not class-qualified; the class is recovered from
        // the method list.
        let mut fixture = Fixture::new();
        let mut class = ClassAttributes::new("app.StringBuilder", "app.py");
        class.add_attribute(ClassAttribute {
            name: "value".to_string(),
            type_info: TypeInfo::concrete("builtins.str", 1.0, TypeSource::Annotation),
        });
        class.add_method("app.StringBuilder.process");
        fixture.attributes.add_class(class);

        let site = site("self.value.upper", "app.process");
        let resolution = SelfAttributeStrategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "builtins.str.upper");
    }

    #[test]
    fn test_self_attribute_custom_class() {
        let mut fixture = Fixture::new();
        let mut class = ClassAttributes::new("app.Service", "app.py");
        class.add_attribute(ClassAttribute {
            name: "handler".to_string(),
            type_info: TypeInfo::concrete("app.Handler", 0.9, TypeSource::Parameter),
        });
        class.add_method("app.Service.run");
        fixture.attributes.add_class(class);
        fixture
            .code_graph
            .add_node(GraphNode::new("app.Handler.process", NodeKind::Method));

        let site = site("self.handler.process", "app.Service.run");
        let resolution = SelfAttributeStrategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "app.Handler.process");
        // Result type is the method's host class.
        assert_eq!(resolution.type_info.fqn(), Some("app.Handler"));
        assert_eq!(resolution.type_info.source, TypeSource::SelfAttributeCustomClass);
    }

    #[test]
    fn test_self_attribute_failures() {
        let mut fixture = Fixture::new();
        let mut class = ClassAttributes::new("app.Service", "app.py");
        class.add_attribute(ClassAttribute {
            name: "handler".to_string(),
            type_info: TypeInfo::concrete("app.Handler", 0.9, TypeSource::Parameter),
        });
        class.add_method("app.Service.run");
        fixture.attributes.add_class(class);

        let cx = fixture.cx();
        // Unknown attribute.
        assert_eq!(
            SelfAttributeStrategy
                .resolve(&site("self.missing.process", "app.Service.run"), &cx)
                .unwrap_err(),
            FailureReason::AttributeNotFound
        );
        // Method absent from the code graph.
        assert_eq!(
            SelfAttributeStrategy
                .resolve(&site("self.handler.process", "app.Service.run"), &cx)
                .unwrap_err(),
            FailureReason::CustomClassUnsupported
        );
        // Caller class unknown.
        assert_eq!(
            SelfAttributeStrategy
                .resolve(&site("self.handler.process", "app.unrelated"), &cx)
                .unwrap_err(),
            FailureReason::ClassNotFound
        );
    }

    #[test]
    fn test_deep_attribute_chain() {
        let mut fixture = Fixture::new();
        let mut service = ClassAttributes::new("app.Service", "app.py");
        service.add_attribute(ClassAttribute {
            name: "db".to_string(),
            type_info: TypeInfo::concrete("app.Db", 0.9, TypeSource::Parameter),
        });
        service.add_method("app.Service.run");
        fixture.attributes.add_class(service);

        let mut db = ClassAttributes::new("app.Db", "app.py");
        db.add_attribute(ClassAttribute {
            name: "session".to_string(),
            type_info: TypeInfo::concrete("app.Session", 0.8, TypeSource::Assignment),
        });
        fixture.attributes.add_class(db);
        fixture
            .code_graph
            .add_node(GraphNode::new("app.Session.commit", NodeKind::Method));

        let site = site("self.db.session.commit", "app.Service.run");
        let resolution = SelfAttributeStrategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "app.Session.commit");
        // 0.9 × 0.8 combined multiplicatively.
        assert!((resolution.type_info.confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn test_deep_chain_depth_bound() {
        let fixture = Fixture::new();
        let site = site("self.a.b.c.d.e.method", "app.Service.run");
        assert_eq!(
            SelfAttributeStrategy.resolve(&site, &fixture.cx()).unwrap_err(),
            FailureReason::DeepChain
        );
    }

    #[test]
    fn test_instance_call_on_builtin() {
        let fixture = Fixture::new();
        let mut scope = FunctionScope::new("app.main");
        scope.add_binding(VariableBinding::new(
            "s",
            TypeInfo::concrete("builtins.str", 1.0, TypeSource::Literal),
            loc(1),
        ));
        let mut scopes = HashMap::new();
        scopes.insert("app.main".to_string(), scope);
        fixture
            .engine
            .register_file("app.py", ImportMap::new(), ReturnExtraction::default(), scopes);

        let strategy = InstanceCallStrategy;
        let site = site("s.upper", "app.main");
        assert!(strategy.can_handle(&site));
        let resolution = strategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "builtins.str.upper");
        assert_eq!(resolution.type_info.source, TypeSource::Builtin);
    }

    #[test]
    fn test_instance_call_placeholder_receiver() {
        let fixture = Fixture::new();
        let mut scope = FunctionScope::new("app.main");
        scope.add_binding(VariableBinding::new(
            "u",
            TypeInfo::new(
                callmap_core::TypeRef::Call("make".to_string()),
                0.3,
                TypeSource::Assignment,
            ),
            loc(1),
        ));
        let mut scopes = HashMap::new();
        scopes.insert("app.main".to_string(), scope);
        fixture
            .engine
            .register_file("app.py", ImportMap::new(), ReturnExtraction::default(), scopes);

        let err = InstanceCallStrategy
            .resolve(&site("u.save", "app.main"), &fixture.cx())
            .unwrap_err();
        assert_eq!(err, FailureReason::ReceiverPlaceholder);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_instance_call_user_class() {
        let mut fixture = Fixture::new();
        fixture
            .code_graph
            .add_node(GraphNode::new("app.User.save", NodeKind::Method));
        let mut scope = FunctionScope::new("app.main");
        scope.add_binding(VariableBinding::new(
            "u",
            TypeInfo::concrete("app.User", 0.8, TypeSource::FunctionCallPropagation),
            loc(1),
        ));
        let mut scopes = HashMap::new();
        scopes.insert("app.main".to_string(), scope);
        fixture
            .engine
            .register_file("app.py", ImportMap::new(), ReturnExtraction::default(), scopes);

        let resolution = InstanceCallStrategy
            .resolve(&site("u.save", "app.main"), &fixture.cx())
            .unwrap();
        assert_eq!(resolution.target_fqn, "app.User.save");
        assert!((resolution.type_info.confidence - 0.8 * 0.95).abs() < 1e-4);
    }

    #[test]
    fn test_attribute_access_imported_function() {
        let fixture = Fixture::new();
        let mut imports = ImportMap::new();
        imports.insert("helpers", "myapp.helpers");
        let mut returns = ReturnExtraction::default();
        returns.return_types.insert(
            "myapp.helpers.format_name".to_string(),
            TypeInfo::concrete("builtins.str", 1.0, TypeSource::ReturnLiteral),
        );
        fixture
            .engine
            .register_file("app.py", imports, returns, HashMap::new());

        let strategy = AttributeAccessStrategy;
        let site = site("helpers.format_name", "app.main");
        assert!(strategy.can_handle(&site));
        let resolution = strategy.resolve(&site, &fixture.cx()).unwrap();
        assert_eq!(resolution.target_fqn, "myapp.helpers.format_name");
        assert_eq!(resolution.type_info.fqn(), Some("builtins.str"));
        assert!((resolution.type_info.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_attribute_access_declines_framework_shapes() {
        let strategy = AttributeAccessStrategy;
        assert!(!strategy.can_handle(&site("Task.objects.filter", "app.main")));
        assert!(!strategy.can_handle(&site("User.query.all", "app.main")));
        assert!(strategy.can_handle(&site("models.Task", "app.main")));
    }

    #[test]
    fn test_framework_strategy() {
        let fixture = Fixture::new();
        let strategy = FrameworkPatternStrategy;
        let site = site("Task.objects.filter", "myapp.views.list_tasks");
        assert!(strategy.can_handle(&site));
        let resolution = strategy.resolve(&site, &fixture.cx()).unwrap();
        // module_path_of falls back to the FQN's parent when unregistered.
        assert_eq!(resolution.target_fqn, "myapp.views.Task.objects.filter");
        assert_eq!(resolution.type_info.source, TypeSource::OrmDjango);
    }

    #[test]
    fn test_fallback_identifier_and_literal() {
        let fixture = Fixture::new();
        let mut returns = ReturnExtraction::default();
        returns.return_types.insert(
            "app.helper".to_string(),
            TypeInfo::concrete("builtins.int", 1.0, TypeSource::ReturnLiteral),
        );
        fixture
            .engine
            .register_file("app.py", ImportMap::new(), returns, HashMap::new());

        let strategy = FallbackStrategy;
        let cx = fixture.cx();

        let resolution = strategy.resolve(&site("helper", "app.main"), &cx).unwrap();
        assert_eq!(resolution.target_fqn, "app.helper");
        assert_eq!(resolution.type_info.fqn(), Some("builtins.int"));

        let resolution = strategy.resolve(&site("\"text\"", "app.main"), &cx).unwrap();
        assert_eq!(resolution.target_fqn, "builtins.str");

        // Unknown identifier: an explicit unknown, never a refusal.
        let resolution = strategy.resolve(&site("mystery", "app.main"), &cx).unwrap();
        assert_eq!(resolution.type_info, TypeInfo::unknown());
        assert_eq!(resolution.target_fqn, "app.mystery");
    }

    #[test]
    fn test_fallback_instantiation() {
        let fixture = Fixture::new();
        let resolution = FallbackStrategy
            .resolve(&site("Widget", "app.main"), &fixture.cx())
            .unwrap();
        assert_eq!(resolution.target_fqn, "app.Widget");
        assert_eq!(resolution.type_info.source, TypeSource::ClassInstantiationGuess);
    }
}
