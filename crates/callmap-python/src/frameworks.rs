//! Framework-specific call patterns.
//!
//! ORM frameworks synthesize manager and query methods at runtime, so no
//! declaration exists for `Task.objects.filter` anywhere in the analyzed
//! code. This resolver recognizes the two common shapes with closed method
//! sets and synthesizes a callable FQN for them:
//!
//! - object-manager pattern: `<Model>.objects.<method>`
//! - query-attribute pattern: `<Model>.query.<method>`
//!
//! Recognition is a closed-set check, not symbolic execution; new
//! frameworks are added by declaring another pattern with its method set.
//! A weak model-validity check adjusts confidence but never gates
//! acceptance.

use callmap_core::{CodeGraph, TypeInfo, TypeSource};

use crate::instantiate::is_pascal_case;
use crate::types::Resolution;

// ============================================================================
// Method Sets
// ============================================================================

/// Manager methods Django synthesizes on `<Model>.objects`.
const MANAGER_METHODS: &[&str] = &[
    "filter",
    "get",
    "create",
    "update",
    "delete",
    "all",
    "first",
    "last",
    "count",
    "exists",
    "exclude",
    "annotate",
    "aggregate",
    "values",
    "values_list",
    "select_related",
    "prefetch_related",
    "only",
    "defer",
    "using",
    "order_by",
    "reverse",
    "distinct",
    "latest",
    "earliest",
    "bulk_create",
    "bulk_update",
    "in_bulk",
    "iterator",
    "update_or_create",
    "get_or_create",
    "none",
];

/// Query methods SQLAlchemy synthesizes on `<Model>.query`.
const QUERY_METHODS: &[&str] = &[
    "filter",
    "filter_by",
    "get",
    "first",
    "all",
    "one",
    "one_or_none",
    "scalar",
    "count",
    "order_by",
    "limit",
    "offset",
    "join",
    "outerjoin",
    "group_by",
    "having",
    "distinct",
];

/// Receiver name suffixes that disqualify the weak model check.
const NON_MODEL_SUFFIXES: &[&str] = &["View", "Serializer", "Form"];

/// Confidence penalty when the weak model check fails.
const MODEL_CHECK_PENALTY: f32 = 0.15;

// ============================================================================
// Recognition
// ============================================================================

/// True when the target matches either recognized pattern shape.
pub fn is_framework_pattern(target: &str) -> bool {
    matches!(split_pattern(target), Some(_))
}

/// Resolve an ORM pattern target to a synthesized FQN.
///
/// Returns `None` for targets that are not `<Model>.objects.<method>` or
/// `<Model>.query.<method>`. Unknown methods on `.objects.` are still
/// accepted (custom managers); the query pattern sticks to its known set.
pub fn resolve_framework_pattern(
    target: &str,
    module_path: &str,
    code_graph: &CodeGraph,
) -> Option<Resolution> {
    let (model, kind, method) = split_pattern(target)?;

    let (base_confidence, source) = match kind {
        PatternKind::Manager => {
            let known = MANAGER_METHODS.contains(&method);
            (if known { 0.8 } else { 0.7 }, TypeSource::OrmDjango)
        }
        PatternKind::Query => {
            if !QUERY_METHODS.contains(&method) {
                return None;
            }
            (0.8, TypeSource::OrmSqlalchemy)
        }
    };

    let confidence = if looks_like_model(model, module_path, code_graph) {
        base_confidence
    } else {
        base_confidence - MODEL_CHECK_PENALTY
    };

    let attr = match kind {
        PatternKind::Manager => "objects",
        PatternKind::Query => "query",
    };
    let target_fqn = format!("{module_path}.{model}.{attr}.{method}");
    let type_info = TypeInfo::concrete(&target_fqn, confidence, source);
    Some(Resolution::new(target_fqn, type_info))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Manager,
    Query,
}

fn split_pattern(target: &str) -> Option<(&str, PatternKind, &str)> {
    let mut parts = target.split('.');
    let (model, attr, method) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || model.is_empty() || method.is_empty() {
        return None;
    }
    let kind = match attr {
        "objects" => PatternKind::Manager,
        "query" => PatternKind::Query,
        _ => return None,
    };
    Some((model, kind, method))
}

/// Weak model-validity check: declared as a class inheriting something
/// with "Model" in the name, or named like a model. Influences confidence
/// only, never acceptance.
fn looks_like_model(model: &str, module_path: &str, code_graph: &CodeGraph) -> bool {
    let fqn = format!("{module_path}.{model}");
    if let Some(node) = code_graph.get(&fqn) {
        if node
            .superclass
            .as_deref()
            .is_some_and(|s| s.contains("Model"))
        {
            return true;
        }
    }
    if model.ends_with("Model") {
        return true;
    }
    is_pascal_case(model) && !NON_MODEL_SUFFIXES.iter().any(|s| model.ends_with(s))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use callmap_core::{GraphNode, NodeKind};

    #[test]
    fn test_manager_pattern_known_method() {
        let resolution =
            resolve_framework_pattern("Task.objects.filter", "myapp.views", &CodeGraph::new())
                .unwrap();
        assert_eq!(resolution.target_fqn, "myapp.views.Task.objects.filter");
        assert_eq!(resolution.type_info.source, TypeSource::OrmDjango);
        assert!((resolution.type_info.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_manager_pattern_accepts_custom_methods() {
        let resolution =
            resolve_framework_pattern("Task.objects.active", "myapp.views", &CodeGraph::new())
                .unwrap();
        assert_eq!(resolution.target_fqn, "myapp.views.Task.objects.active");
        assert!((resolution.type_info.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_query_pattern() {
        let resolution =
            resolve_framework_pattern("User.query.filter_by", "myapp.models", &CodeGraph::new())
                .unwrap();
        assert_eq!(resolution.target_fqn, "myapp.models.User.query.filter_by");
        assert_eq!(resolution.type_info.source, TypeSource::OrmSqlalchemy);
    }

    #[test]
    fn test_query_pattern_rejects_unknown_methods() {
        assert!(resolve_framework_pattern("User.query.frobnicate", "m", &CodeGraph::new())
            .is_none());
    }

    #[test]
    fn test_non_pattern_targets_rejected() {
        for target in [
            "Task.filter",
            "Task.objects",
            "Task.objects.filter.extra",
            "task_list.objects.filter",
            "obj.method",
        ] {
            let accepted = resolve_framework_pattern(target, "m", &CodeGraph::new()).is_some();
            let expected = target == "task_list.objects.filter";
            assert_eq!(accepted, expected, "target: {target}");
        }
    }

    #[test]
    fn test_model_check_influences_confidence_not_acceptance() {
        // "TaskView" fails the weak model check but is still accepted.
        let resolution =
            resolve_framework_pattern("TaskView.objects.filter", "myapp.views", &CodeGraph::new())
                .unwrap();
        assert!((resolution.type_info.confidence - 0.65).abs() < 1e-6);

        // A declared subclass of models.Model passes the check.
        let mut graph = CodeGraph::new();
        graph.add_node(
            GraphNode::new("myapp.views.TaskView", NodeKind::Class).with_superclass("models.Model"),
        );
        let resolution =
            resolve_framework_pattern("TaskView.objects.filter", "myapp.views", &graph).unwrap();
        assert!((resolution.type_info.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_lowercase_receiver_still_accepted_with_penalty() {
        let resolution =
            resolve_framework_pattern("task_list.objects.filter", "m", &CodeGraph::new()).unwrap();
        assert!((resolution.type_info.confidence - 0.65).abs() < 1e-6);
    }
}
