//! Declared-symbol code graph and the finished call graph.
//!
//! [`CodeGraph`] is the collaborator interface: a catalog of every declared
//! module, class, function, and method in the analyzed program, keyed by
//! FQN. It is built elsewhere (filesystem traversal and declaration
//! extraction are out of scope here); resolution only reads it.
//!
//! [`CallGraph`] is the product: directed edges
//! `(caller_fqn → target_fqn, confidence, source)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::facts::TypeSource;

// ============================================================================
// Node Kinds
// ============================================================================

/// Kind of a declared symbol in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    #[default]
    Function,
    Method,
    Constructor,
    Property,
    SpecialMethod,
    Variable,
    Attribute,
}

impl NodeKind {
    /// True for kinds a call site can legally target.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::Function
                | NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Property
                | NodeKind::SpecialMethod
        )
    }
}

// ============================================================================
// Graph Nodes
// ============================================================================

/// A declared symbol: module, class, function, method, or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Fully qualified name, e.g. `myapp.models.Task.save`.
    pub fqn: String,
    /// Simple name, e.g. `save`.
    pub name: String,
    /// Kind of the declaration.
    pub kind: NodeKind,
    /// Superclass name for classes, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
}

impl GraphNode {
    /// Create a new node. The simple name is derived from the FQN.
    pub fn new(fqn: impl Into<String>, kind: NodeKind) -> Self {
        let fqn = fqn.into();
        let name = fqn.rsplit('.').next().unwrap_or(&fqn).to_string();
        GraphNode {
            fqn,
            name,
            kind,
            superclass: None,
        }
    }

    /// Set the superclass name.
    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }
}

// ============================================================================
// Code Graph
// ============================================================================

/// Catalog of declared symbols, keyed by FQN.
///
/// Read-heavy during resolution; built once before analysis starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeGraph {
    nodes: HashMap<String, GraphNode>,
}

impl CodeGraph {
    /// Create an empty code graph.
    pub fn new() -> Self {
        CodeGraph::default()
    }

    /// Add a node, replacing any previous declaration at the same FQN.
    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.fqn.clone(), node);
    }

    /// Look up a node by FQN.
    pub fn get(&self, fqn: &str) -> Option<&GraphNode> {
        self.nodes.get(fqn)
    }

    /// True if any declaration exists at this FQN.
    pub fn contains(&self, fqn: &str) -> bool {
        self.nodes.contains_key(fqn)
    }

    /// True if a callable declaration (function, method, constructor,
    /// property, or special method) exists at this FQN.
    pub fn is_callable(&self, fqn: &str) -> bool {
        self.nodes.get(fqn).is_some_and(|n| n.kind.is_callable())
    }

    /// True if a class is declared at this FQN.
    pub fn is_class(&self, fqn: &str) -> bool {
        self.nodes
            .get(fqn)
            .is_some_and(|n| n.kind == NodeKind::Class)
    }

    /// Number of declared nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes are declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all nodes.
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }
}

// ============================================================================
// Call Graph
// ============================================================================

/// A resolved call edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    /// FQN of the enclosing function (or module path for module-level calls).
    pub caller_fqn: String,
    /// FQN the call resolved to.
    pub target_fqn: String,
    /// Confidence of the resolution, in `[0, 1]`.
    pub confidence: f32,
    /// Provenance of the inference that produced the edge.
    pub source: TypeSource,
}

impl CallEdge {
    /// Create a new edge, clamping confidence into `[0, 1]`.
    pub fn new(
        caller_fqn: impl Into<String>,
        target_fqn: impl Into<String>,
        confidence: f32,
        source: TypeSource,
    ) -> Self {
        CallEdge {
            caller_fqn: caller_fqn.into(),
            target_fqn: target_fqn.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }
}

/// The finished call graph: an append-only edge list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    edges: Vec<CallEdge>,
}

impl CallGraph {
    /// Create an empty call graph.
    pub fn new() -> Self {
        CallGraph::default()
    }

    /// Append an edge.
    pub fn add_edge(&mut self, edge: CallEdge) {
        self.edges.push(edge);
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    /// Edges whose caller is `caller_fqn`.
    pub fn callees_of<'a>(&'a self, caller_fqn: &'a str) -> impl Iterator<Item = &'a CallEdge> {
        self.edges.iter().filter(move |e| e.caller_fqn == caller_fqn)
    }

    /// Edges whose target is `target_fqn`.
    pub fn callers_of<'a>(&'a self, target_fqn: &'a str) -> impl Iterator<Item = &'a CallEdge> {
        self.edges.iter().filter(move |e| e.target_fqn == target_fqn)
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when no edges have been added.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> CodeGraph {
        let mut graph = CodeGraph::new();
        graph.add_node(GraphNode::new("app", NodeKind::Module));
        graph.add_node(GraphNode::new("app.User", NodeKind::Class).with_superclass("Model"));
        graph.add_node(GraphNode::new("app.User.save", NodeKind::Method));
        graph.add_node(GraphNode::new("app.User.__init__", NodeKind::Constructor));
        graph.add_node(GraphNode::new("app.helper", NodeKind::Function));
        graph
    }

    #[test]
    fn test_node_simple_name_derived_from_fqn() {
        let node = GraphNode::new("app.models.Task.save", NodeKind::Method);
        assert_eq!(node.name, "save");
        let bare = GraphNode::new("helper", NodeKind::Function);
        assert_eq!(bare.name, "helper");
    }

    #[test]
    fn test_is_callable_kinds() {
        let graph = sample_graph();
        assert!(graph.is_callable("app.User.save"));
        assert!(graph.is_callable("app.User.__init__"));
        assert!(graph.is_callable("app.helper"));
        assert!(!graph.is_callable("app.User"));
        assert!(!graph.is_callable("app"));
        assert!(!graph.is_callable("app.missing"));
    }

    #[test]
    fn test_is_class_and_superclass() {
        let graph = sample_graph();
        assert!(graph.is_class("app.User"));
        assert!(!graph.is_class("app.helper"));
        assert_eq!(
            graph.get("app.User").unwrap().superclass.as_deref(),
            Some("Model")
        );
    }

    #[test]
    fn test_call_graph_edge_queries() {
        let mut cg = CallGraph::new();
        cg.add_edge(CallEdge::new("app.main", "app.helper", 0.9, TypeSource::Assignment));
        cg.add_edge(CallEdge::new("app.main", "app.User.save", 0.8, TypeSource::SelfAttribute));
        cg.add_edge(CallEdge::new("app.other", "app.helper", 0.7, TypeSource::Heuristic));

        assert_eq!(cg.len(), 3);
        assert_eq!(cg.callees_of("app.main").count(), 2);
        assert_eq!(cg.callers_of("app.helper").count(), 2);
    }

    #[test]
    fn test_edge_confidence_clamped() {
        let edge = CallEdge::new("a", "b", 1.7, TypeSource::Literal);
        assert!((edge.confidence - 1.0).abs() < f32::EPSILON);
    }
}
