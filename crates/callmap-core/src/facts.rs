//! Shared type-inference facts.
//!
//! This module defines the vocabulary every frontend and the call-graph
//! builder agree on:
//!
//! - [`TypeRef`]: a concrete fully qualified type name, a deferred
//!   placeholder, or unknown
//! - [`TypeInfo`]: a `TypeRef` plus a calibrated confidence and the
//!   provenance of the inference
//! - [`TypeSource`]: the closed provenance tag set
//! - [`FailureReason`]: why a call site stayed unresolved
//!
//! Placeholders are deferred-resolution tokens. `call:F` means "the return
//! type of `F`, resolved once `F`'s file has been extracted"; `var:V` means
//! "the binding of `V` in the enclosing scope"; `class:N` and `param:N`
//! mean "the class named `N`, resolved against the module registry and
//! import map". Every placeholder is either eliminated during propagation
//! or demoted to unknown before an edge is emitted.

use serde::{Deserialize, Serialize};

// ============================================================================
// TypeRef
// ============================================================================

/// A resolved or deferred reference to a type.
///
/// Serialized as the compact string form used throughout the stored model
/// (`"app.User"`, `"call:make_user"`, `""` for unknown), so snapshots stay
/// stable and greppable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TypeRef {
    /// A concrete fully qualified name, e.g. `builtins.str` or `app.User`.
    Concrete(String),
    /// Return type of the named function, resolved during propagation.
    Call(String),
    /// Type of the named variable in the enclosing scope.
    Var(String),
    /// The class with this simple name, resolved against imports/registry.
    Class(String),
    /// A typed parameter whose annotation names this class.
    Param(String),
    /// No information.
    Unknown,
}

impl TypeRef {
    /// Parse the compact string form.
    pub fn parse(text: &str) -> TypeRef {
        if text.is_empty() {
            return TypeRef::Unknown;
        }
        if let Some(rest) = text.strip_prefix("call:") {
            return TypeRef::Call(rest.to_string());
        }
        if let Some(rest) = text.strip_prefix("var:") {
            return TypeRef::Var(rest.to_string());
        }
        if let Some(rest) = text.strip_prefix("class:") {
            return TypeRef::Class(rest.to_string());
        }
        if let Some(rest) = text.strip_prefix("param:") {
            return TypeRef::Param(rest.to_string());
        }
        TypeRef::Concrete(text.to_string())
    }

    /// Create a concrete reference.
    pub fn concrete(fqn: impl Into<String>) -> TypeRef {
        TypeRef::Concrete(fqn.into())
    }

    /// True for `call:`, `var:`, `class:`, and `param:` references.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            TypeRef::Call(_) | TypeRef::Var(_) | TypeRef::Class(_) | TypeRef::Param(_)
        )
    }

    /// True only for [`TypeRef::Concrete`].
    pub fn is_concrete(&self) -> bool {
        matches!(self, TypeRef::Concrete(_))
    }

    /// The concrete FQN, if this reference is concrete.
    pub fn as_concrete(&self) -> Option<&str> {
        match self {
            TypeRef::Concrete(fqn) => Some(fqn.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Concrete(fqn) => write!(f, "{fqn}"),
            TypeRef::Call(name) => write!(f, "call:{name}"),
            TypeRef::Var(name) => write!(f, "var:{name}"),
            TypeRef::Class(name) => write!(f, "class:{name}"),
            TypeRef::Param(name) => write!(f, "param:{name}"),
            TypeRef::Unknown => Ok(()),
        }
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> String {
        value.to_string()
    }
}

impl From<String> for TypeRef {
    fn from(value: String) -> TypeRef {
        TypeRef::parse(&value)
    }
}

// ============================================================================
// TypeSource
// ============================================================================

/// Provenance of an inferred type.
///
/// Every [`TypeInfo`] carries one of these tags; the tag survives onto the
/// finished call-graph edge so consumers can filter by inference quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    Literal,
    Annotation,
    Assignment,
    ReturnLiteral,
    ReturnBuiltinConstructor,
    ReturnFunctionCall,
    ReturnVariable,
    ClassInstantiationImport,
    ClassInstantiationLocal,
    ClassInstantiationHeuristic,
    ClassInstantiationGuess,
    FunctionCallPropagation,
    FunctionCallAttribute,
    SelfAttribute,
    SelfAttributeCustomClass,
    MethodChain,
    MethodChainFluent,
    MethodChainHeuristic,
    Builtin,
    Stdlib,
    OrmDjango,
    OrmSqlalchemy,
    Parameter,
    Heuristic,
    #[default]
    Unknown,
}

impl TypeSource {
    /// The snake_case tag string used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeSource::Literal => "literal",
            TypeSource::Annotation => "annotation",
            TypeSource::Assignment => "assignment",
            TypeSource::ReturnLiteral => "return_literal",
            TypeSource::ReturnBuiltinConstructor => "return_builtin_constructor",
            TypeSource::ReturnFunctionCall => "return_function_call",
            TypeSource::ReturnVariable => "return_variable",
            TypeSource::ClassInstantiationImport => "class_instantiation_import",
            TypeSource::ClassInstantiationLocal => "class_instantiation_local",
            TypeSource::ClassInstantiationHeuristic => "class_instantiation_heuristic",
            TypeSource::ClassInstantiationGuess => "class_instantiation_guess",
            TypeSource::FunctionCallPropagation => "function_call_propagation",
            TypeSource::FunctionCallAttribute => "function_call_attribute",
            TypeSource::SelfAttribute => "self_attribute",
            TypeSource::SelfAttributeCustomClass => "self_attribute_custom_class",
            TypeSource::MethodChain => "method_chain",
            TypeSource::MethodChainFluent => "method_chain_fluent",
            TypeSource::MethodChainHeuristic => "method_chain_heuristic",
            TypeSource::Builtin => "builtin",
            TypeSource::Stdlib => "stdlib",
            TypeSource::OrmDjango => "orm_django",
            TypeSource::OrmSqlalchemy => "orm_sqlalchemy",
            TypeSource::Parameter => "parameter",
            TypeSource::Heuristic => "heuristic",
            TypeSource::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TypeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TypeInfo
// ============================================================================

/// An inferred type with calibrated confidence and provenance.
///
/// Invariants maintained by every producer:
/// - a placeholder reference never carries confidence above 0.6
/// - a concrete reference from an explicit annotation carries ≥ 0.9
/// - confidence stays within `[0.0, 1.0]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// The inferred type, placeholder, or unknown.
    pub type_ref: TypeRef,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Where the inference came from.
    pub source: TypeSource,
}

impl TypeInfo {
    /// Create a new type info, clamping confidence into `[0, 1]` and
    /// capping placeholder confidence at 0.6.
    pub fn new(type_ref: TypeRef, confidence: f32, source: TypeSource) -> Self {
        let cap = if type_ref.is_placeholder() { 0.6 } else { 1.0 };
        TypeInfo {
            type_ref,
            confidence: confidence.clamp(0.0, cap),
            source,
        }
    }

    /// A concrete type.
    pub fn concrete(fqn: impl Into<String>, confidence: f32, source: TypeSource) -> Self {
        TypeInfo::new(TypeRef::Concrete(fqn.into()), confidence, source)
    }

    /// The unknown type.
    pub fn unknown() -> Self {
        TypeInfo {
            type_ref: TypeRef::Unknown,
            confidence: 0.0,
            source: TypeSource::Unknown,
        }
    }

    /// True for placeholder references.
    pub fn is_placeholder(&self) -> bool {
        self.type_ref.is_placeholder()
    }

    /// True for concrete references.
    pub fn is_concrete(&self) -> bool {
        self.type_ref.is_concrete()
    }

    /// The concrete FQN, if any.
    pub fn fqn(&self) -> Option<&str> {
        self.type_ref.as_concrete()
    }

    /// A copy with confidence multiplied by `factor` (clamped to `[0, 1]`).
    pub fn scaled(&self, factor: f32) -> Self {
        TypeInfo {
            type_ref: self.type_ref.clone(),
            confidence: (self.confidence * factor).clamp(0.0, 1.0),
            source: self.source,
        }
    }

    /// A copy with a different provenance tag.
    pub fn with_source(mut self, source: TypeSource) -> Self {
        self.source = source;
        self
    }
}

// ============================================================================
// FailureReason
// ============================================================================

/// Why a call site could not be resolved.
///
/// Retryable reasons mean a later fixed-point iteration may supply the
/// missing type; the rest are terminal for the strategy that reported them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The `self.…` resolver was asked about a non-self target.
    NotSelfPrefix,
    /// Attribute chain exceeds the configured maximum depth.
    DeepChain,
    /// The caller's enclosing class could not be identified.
    ClassNotFound,
    /// The class has no attribute with this name.
    AttributeNotFound,
    /// The builtin type does not expose this method.
    MethodNotInBuiltins,
    /// The user class method is not present in the code graph.
    CustomClassUnsupported,
    /// The chain's first step has no concrete type yet.
    FirstStepUnresolved,
    /// The instance-method receiver is still a placeholder.
    ReceiverPlaceholder,
}

impl FailureReason {
    /// True when the next propagation iteration may resolve the site.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::FirstStepUnresolved | FailureReason::ReceiverPlaceholder
        )
    }

    /// The snake_case tag string used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NotSelfPrefix => "not_self_prefix",
            FailureReason::DeepChain => "deep_chain",
            FailureReason::ClassNotFound => "class_not_found",
            FailureReason::AttributeNotFound => "attribute_not_found",
            FailureReason::MethodNotInBuiltins => "method_not_in_builtins",
            FailureReason::CustomClassUnsupported => "custom_class_unsupported",
            FailureReason::FirstStepUnresolved => "first_step_unresolved",
            FailureReason::ReceiverPlaceholder => "receiver_placeholder",
        }
    }

    /// All reasons, in the order failure statistics report them.
    pub fn all() -> &'static [FailureReason] {
        &[
            FailureReason::NotSelfPrefix,
            FailureReason::DeepChain,
            FailureReason::ClassNotFound,
            FailureReason::AttributeNotFound,
            FailureReason::MethodNotInBuiltins,
            FailureReason::CustomClassUnsupported,
            FailureReason::FirstStepUnresolved,
            FailureReason::ReceiverPlaceholder,
        ]
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_round_trip() {
        for text in ["app.User", "call:make_user", "var:u", "class:Task", "param:Handler", ""] {
            let parsed = TypeRef::parse(text);
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_type_ref_placeholder_classification() {
        assert!(TypeRef::parse("call:f").is_placeholder());
        assert!(TypeRef::parse("var:v").is_placeholder());
        assert!(TypeRef::parse("class:C").is_placeholder());
        assert!(TypeRef::parse("param:P").is_placeholder());
        assert!(!TypeRef::parse("builtins.str").is_placeholder());
        assert!(!TypeRef::Unknown.is_placeholder());
        assert!(TypeRef::parse("builtins.str").is_concrete());
    }

    #[test]
    fn test_placeholder_confidence_is_capped() {
        let info = TypeInfo::new(TypeRef::parse("call:get"), 0.9, TypeSource::ReturnFunctionCall);
        assert!(info.confidence <= 0.6);

        let concrete = TypeInfo::concrete("app.User", 0.9, TypeSource::Annotation);
        assert!((concrete.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_confidence_clamped_to_unit_interval() {
        let info = TypeInfo::concrete("builtins.int", 3.0, TypeSource::Literal);
        assert!((info.confidence - 1.0).abs() < f32::EPSILON);
        let info = TypeInfo::concrete("builtins.int", -1.0, TypeSource::Literal);
        assert_eq!(info.confidence, 0.0);
    }

    #[test]
    fn test_scaled_multiplies_confidence() {
        let info = TypeInfo::concrete("builtins.str", 1.0, TypeSource::Builtin);
        let scaled = info.scaled(0.85);
        assert!((scaled.confidence - 0.85).abs() < 1e-6);
        assert_eq!(scaled.type_ref, info.type_ref);
    }

    #[test]
    fn test_type_ref_serializes_as_string() {
        let info = TypeInfo::new(TypeRef::parse("call:f"), 0.3, TypeSource::ReturnFunctionCall);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"call:f\""));
        assert!(json.contains("\"return_function_call\""));
        let back: TypeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.type_ref, TypeRef::Call("f".to_string()));
    }

    #[test]
    fn test_failure_reason_retryability() {
        assert!(FailureReason::FirstStepUnresolved.is_retryable());
        assert!(FailureReason::ReceiverPlaceholder.is_retryable());
        assert!(!FailureReason::NotSelfPrefix.is_retryable());
        assert!(!FailureReason::DeepChain.is_retryable());
        assert!(!FailureReason::AttributeNotFound.is_retryable());
    }

    #[test]
    fn test_source_tags_are_snake_case() {
        assert_eq!(TypeSource::OrmDjango.as_str(), "orm_django");
        assert_eq!(TypeSource::ReturnBuiltinConstructor.as_str(), "return_builtin_constructor");
        let json = serde_json::to_string(&TypeSource::MethodChainFluent).unwrap();
        assert_eq!(json, "\"method_chain_fluent\"");
    }
}
