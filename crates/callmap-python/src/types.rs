//! Shared data types for Python call-graph analysis.
//!
//! This module contains the per-file analysis currency: variable bindings
//! with reassignment history, function scopes, class attribute catalogs,
//! extracted return statements, and call sites. All of it is serializable
//! so callers can snapshot intermediate state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use callmap_core::{FailureReason, Location, TypeInfo};

// ============================================================================
// Variable Bindings
// ============================================================================

/// One assignment of a variable within a scope.
///
/// A variable may be bound multiple times; bindings are kept in source
/// order so line-aware lookups can pick the binding in effect at a given
/// call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBinding {
    /// The variable name.
    pub var_name: String,
    /// Inferred type of the bound value.
    pub type_info: TypeInfo,
    /// FQN of the function whose return value produced this binding,
    /// when the RHS was a resolved call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_from: Option<String>,
    /// Where the assignment occurs.
    pub location: Location,
}

impl VariableBinding {
    /// Create a new binding.
    pub fn new(var_name: impl Into<String>, type_info: TypeInfo, location: Location) -> Self {
        VariableBinding {
            var_name: var_name.into(),
            type_info,
            assigned_from: None,
            location,
        }
    }

    /// Record the function whose return produced this value.
    pub fn with_assigned_from(mut self, fqn: impl Into<String>) -> Self {
        self.assigned_from = Some(fqn.into());
        self
    }
}

// ============================================================================
// Function Scopes
// ============================================================================

/// Variable bindings and return type for one function (or module) scope.
///
/// Module-level code uses the module path as the scope key. Scopes are
/// created during extraction and mutated only by the propagation phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionScope {
    /// FQN of the owning function, or the module path for top-level code.
    pub function_fqn: String,
    /// Binding history per variable, in source-line order.
    pub variables: HashMap<String, Vec<VariableBinding>>,
    /// Merged return type, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeInfo>,
}

impl FunctionScope {
    /// Create an empty scope for a function FQN.
    pub fn new(function_fqn: impl Into<String>) -> Self {
        FunctionScope {
            function_fqn: function_fqn.into(),
            variables: HashMap::new(),
            return_type: None,
        }
    }

    /// Append a binding, keeping the history ordered by source row.
    pub fn add_binding(&mut self, binding: VariableBinding) {
        let history = self.variables.entry(binding.var_name.clone()).or_default();
        let at = history
            .iter()
            .position(|b| b.location.row > binding.location.row)
            .unwrap_or(history.len());
        history.insert(at, binding);
    }

    /// The most recent binding of `name`, by source order.
    pub fn current_binding(&self, name: &str) -> Option<&VariableBinding> {
        self.variables.get(name).and_then(|h| h.last())
    }

    /// The binding of `name` in effect at `row`: the last binding whose
    /// row does not exceed the query row, falling back to the first
    /// binding when all of them come later.
    pub fn binding_at(&self, name: &str, row: u32) -> Option<&VariableBinding> {
        let history = self.variables.get(name)?;
        history
            .iter()
            .rev()
            .find(|b| b.location.row <= row)
            .or_else(|| history.first())
    }

    /// Mutable access to the full binding history of `name`.
    pub fn bindings_mut(&mut self, name: &str) -> Option<&mut Vec<VariableBinding>> {
        self.variables.get_mut(name)
    }
}

// ============================================================================
// Class Attributes
// ============================================================================

/// An instance attribute recorded for a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAttribute {
    /// Attribute name (`handler` for `self.handler = …`).
    pub name: String,
    /// Inferred type, possibly still a placeholder until the resolution
    /// pass runs.
    pub type_info: TypeInfo,
}

/// Per-class catalog of instance attributes and declared methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassAttributes {
    /// FQN of the class.
    pub class_fqn: String,
    /// File the class is declared in.
    pub file_path: String,
    /// Attribute name → recorded attribute.
    pub attributes: HashMap<String, ClassAttribute>,
    /// Fully qualified method names declared on the class.
    pub methods: Vec<String>,
}

impl ClassAttributes {
    /// Create an empty catalog for a class.
    pub fn new(class_fqn: impl Into<String>, file_path: impl Into<String>) -> Self {
        ClassAttributes {
            class_fqn: class_fqn.into(),
            file_path: file_path.into(),
            attributes: HashMap::new(),
            methods: Vec::new(),
        }
    }

    /// Record an attribute. First sight wins; later assignments to the
    /// same attribute do not override an existing record with a weaker
    /// inference.
    pub fn add_attribute(&mut self, attr: ClassAttribute) {
        match self.attributes.get(&attr.name) {
            Some(existing) if existing.type_info.confidence >= attr.type_info.confidence => {}
            _ => {
                self.attributes.insert(attr.name.clone(), attr);
            }
        }
    }

    /// Record a declared method FQN.
    pub fn add_method(&mut self, method_fqn: impl Into<String>) {
        self.methods.push(method_fqn.into());
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&ClassAttribute> {
        self.attributes.get(name)
    }
}

// ============================================================================
// Return Statements
// ============================================================================

/// One `return <expr>` statement with its inferred type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    /// FQN of the enclosing function.
    pub function_fqn: String,
    /// Inferred type of the returned expression.
    pub type_info: TypeInfo,
    /// Where the return occurs.
    pub location: Location,
}

// ============================================================================
// Call Sites
// ============================================================================

/// One argument at a call site, in textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgument {
    /// Source text of the argument.
    pub text: String,
    /// True when the argument is a bare identifier.
    pub is_identifier: bool,
}

/// A call site extracted from the AST, carried through resolution.
///
/// Lifecycle: created during traversal → enqueued → resolved by the call
/// graph builder → either `resolved` with a `target_fqn`, or retained
/// unresolved with a `failure` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Textual call target as written: `foo`, `obj.method`,
    /// `Cls().method`, `self.x.y`.
    pub target: String,
    /// FQN of the enclosing function (module path at top level).
    pub caller_fqn: String,
    /// Where the call occurs.
    pub location: Location,
    /// Arguments in call order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CallArgument>,
    /// Set once resolution succeeds.
    #[serde(default)]
    pub resolved: bool,
    /// FQN the call resolved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_fqn: Option<String>,
    /// Why resolution failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl CallSite {
    /// Create an unresolved call site.
    pub fn new(
        target: impl Into<String>,
        caller_fqn: impl Into<String>,
        location: Location,
    ) -> Self {
        CallSite {
            target: target.into(),
            caller_fqn: caller_fqn.into(),
            location,
            arguments: Vec::new(),
            resolved: false,
            target_fqn: None,
            failure: None,
        }
    }

    /// Set the arguments.
    pub fn with_arguments(mut self, arguments: Vec<CallArgument>) -> Self {
        self.arguments = arguments;
        self
    }

    /// True when the target contains a call followed by attribute access.
    pub fn is_chain(&self) -> bool {
        self.target.contains(").")
    }
}

/// A successful resolution: the target FQN plus the inferred type that
/// justified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// FQN the call site resolved to.
    pub target_fqn: String,
    /// Type inference backing the resolution; its confidence and source
    /// become the edge's.
    pub type_info: TypeInfo,
}

impl Resolution {
    /// Create a resolution.
    pub fn new(target_fqn: impl Into<String>, type_info: TypeInfo) -> Self {
        Resolution {
            target_fqn: target_fqn.into(),
            type_info,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
