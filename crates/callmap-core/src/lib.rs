//! Core infrastructure for callmap.
//!
//! This crate holds the language-independent pieces of the call-graph
//! engine:
//!
//! - `span`: byte spans and source locations
//! - `facts`: the shared type-inference vocabulary (type references,
//!   confidence-tagged type info, provenance tags, failure reasons)
//! - `graph`: the declared-symbol code graph consumed by resolution, and
//!   the finished call graph produced by it
//! - `config`: analysis configuration options
//! - `error`: the unified error type
//!
//! Language frontends (e.g. `callmap-python`) build on these types; the
//! core carries no parser and performs no inference itself.

pub mod config;
pub mod error;
pub mod facts;
pub mod graph;
pub mod span;

pub use config::AnalysisConfig;
pub use error::{CallmapError, CallmapResult};
pub use facts::{FailureReason, TypeInfo, TypeRef, TypeSource};
pub use graph::{CallEdge, CallGraph, CodeGraph, GraphNode, NodeKind};
pub use span::{Location, Span};
