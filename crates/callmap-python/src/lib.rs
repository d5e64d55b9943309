//! Python frontend for callmap: type inference and call-site resolution.
//!
//! This crate turns parsed Python source into typed call-graph edges:
//!
//! - `ast`: tree-sitter parsing seam
//! - `builtins`: primitive-type catalog and literal inference
//! - `modules`: module registry (file ↔ module paths, short names)
//! - `imports`: per-file import maps with relative-import resolution
//! - `infer`: shared expression-type rules
//! - `returns`: per-function return-type extraction
//! - `bindings`: assignment extraction into function scopes
//! - `attributes`: class-attribute catalogs and placeholder resolution
//! - `store`: scope-stacked type store and the LRU type cache
//! - `engine`: shared inference state and fixed-point propagation
//! - `instantiate` / `chains` / `frameworks`: the resolution building
//!   blocks for constructor calls, method chains, and ORM patterns
//! - `strategies`: priority-ordered call-site resolution
//! - `callsites`: call-site extraction
//! - `graph`: call-graph builder and failure statistics
//! - `analyzer`: the two-phase whole-project pipeline

pub mod analyzer;
pub mod ast;
pub mod attributes;
pub mod bindings;
pub mod builtins;
pub mod callsites;
pub mod chains;
pub mod engine;
pub mod frameworks;
pub mod graph;
pub mod imports;
pub mod infer;
pub mod instantiate;
pub mod modules;
pub mod returns;
pub mod store;
pub mod strategies;
pub mod types;

pub use analyzer::{analyze_project, ProjectAnalysis, SourceFile};
pub use attributes::AttributeRegistry;
pub use builtins::BuiltinRegistry;
pub use engine::InferenceEngine;
pub use graph::{CallGraphBuilder, FailureStats, ResolveOutcome};
pub use imports::ImportMap;
pub use modules::ModuleRegistry;
pub use store::{TypeCache, TypeStore};
pub use types::{CallSite, ClassAttribute, ClassAttributes, FunctionScope, VariableBinding};
