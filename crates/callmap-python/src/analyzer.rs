//! Whole-project analysis pipeline.
//!
//! Two phases over the input files:
//!
//! - **Phase A (parallel)**: a quick declaration sweep populates the
//!   module registry's short-name index, then each file is parsed and its
//!   imports, return types, bindings, class attributes, and call sites are
//!   extracted. Workers write into the shared engine and registries under
//!   coarse locks; the final state is independent of worker interleaving.
//! - **Phase B (single-threaded)**: fixed-point propagation, attribute
//!   placeholder resolution, then call-site resolution through the
//!   strategy registry.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info};
use tree_sitter::Node;

use callmap_core::{AnalysisConfig, CallGraph, CallmapResult, CodeGraph};

use crate::ast::{self, PythonParser};
use crate::attributes::{self, AttributeRegistry};
use crate::bindings;
use crate::builtins::BuiltinRegistry;
use crate::callsites;
use crate::engine::InferenceEngine;
use crate::graph::{CallGraphBuilder, FailureStats};
use crate::imports;
use crate::infer::InferenceContext;
use crate::modules::ModuleRegistry;
use crate::returns;
use crate::strategies::ResolutionContext;
use crate::types::CallSite;

// ============================================================================
// Inputs and Outcome
// ============================================================================

/// One source file handed to the analyzer. Reading files from disk is the
/// caller's job.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Project-relative path, e.g. `myapp/views.py`.
    pub path: String,
    /// Full file contents.
    pub source: String,
}

impl SourceFile {
    /// Create a source file.
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Everything a finished analysis run produced.
pub struct ProjectAnalysis {
    /// The finished call graph.
    pub call_graph: CallGraph,
    /// Sites that stayed unresolved, with failure tags.
    pub unresolved: Vec<CallSite>,
    /// Aggregated failure statistics.
    pub failure_stats: FailureStats,
    /// Fixed-point passes executed.
    pub iterations: u32,
    /// The engine, for follow-up type queries.
    pub engine: InferenceEngine,
    /// The attribute registry after placeholder resolution.
    pub attributes: AttributeRegistry,
    /// The module registry the run was built over.
    pub modules: Arc<ModuleRegistry>,
}

// ============================================================================
// Module Path Derivation
// ============================================================================

/// Derive a dotted module path from a project-relative file path.
///
/// `myapp/views.py` → `myapp.views`; package `__init__.py` files map to
/// the package itself.
pub fn module_path_from_file(path: &str) -> String {
    let trimmed = path
        .trim_start_matches("./")
        .trim_end_matches(".py")
        .replace(['/', '\\'], ".");
    trimmed
        .strip_suffix(".__init__")
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.trim_end_matches("__init__").to_string())
}

// ============================================================================
// Analysis
// ============================================================================

/// Analyze a set of files against a declared-symbol code graph.
pub fn analyze_project(
    files: &[SourceFile],
    code_graph: &CodeGraph,
    config: AnalysisConfig,
) -> CallmapResult<ProjectAnalysis> {
    // Register modules up front so import normalization sees every file.
    let mut registry = ModuleRegistry::new();
    if let Some(root) = &config.project_root_override {
        registry.set_project_root_override(root.as_str());
    }
    for file in files {
        registry.add_module(module_path_from_file(&file.path), &file.path);
    }

    // Declaration sweep: short names must be complete before extraction
    // so local instantiations resolve at their proper confidence.
    let declarations: Vec<(String, Vec<String>)> = files
        .par_iter()
        .map(|file| {
            let mut parser = PythonParser::new()?;
            let tree = parser.parse(&file.source, &file.path)?;
            Ok((file.path.clone(), collect_declared(tree.root_node(), &file.source)))
        })
        .collect::<CallmapResult<_>>()?;
    for (path, names) in declarations {
        for name in names {
            registry.add_short_name(name, &path);
        }
    }
    let modules = Arc::new(registry);

    let engine = InferenceEngine::new(config.clone(), Arc::clone(&modules));
    let builtins = BuiltinRegistry::new();
    let attributes = Mutex::new(AttributeRegistry::new());
    let sites = Mutex::new(Vec::new());

    // Phase A: per-file extraction, embarrassingly parallel.
    files.par_iter().try_for_each(|file| -> CallmapResult<()> {
        let mut parser = PythonParser::new()?;
        let tree = parser.parse(&file.source, &file.path)?;
        let root = tree.root_node();
        let module_path = modules
            .get_module_path(&file.path)
            .unwrap_or(&file.path)
            .to_string();

        let import_map = imports::extract_imports(root, &file.source, &module_path, &modules);
        let cx = InferenceContext {
            source: &file.source,
            module_path: &module_path,
            builtins: &builtins,
            imports: &import_map,
            registry: &modules,
        };

        let extraction = returns::extract_return_types(root, &file.path, &cx);
        let scopes = bindings::extract_bindings(root, &file.path, &cx);
        let (classes, _) = attributes::extract_class_attributes(root, &file.path, &cx);
        let file_sites = callsites::extract_call_sites(root, &file.source, &module_path, &file.path);

        debug!(
            file = %file.path,
            returns = extraction.return_types.len(),
            scopes = scopes.len(),
            classes = classes.len(),
            sites = file_sites.len(),
            "extracted file"
        );

        engine.register_file(&file.path, import_map, extraction, scopes);
        {
            let mut registry = attributes.lock();
            for class in classes {
                registry.add_class(class);
            }
        }
        sites.lock().extend(file_sites);
        Ok(())
    })?;

    // Phase B: propagation, attribute placeholders, resolution.
    let iterations = engine.propagate();

    let mut attributes = attributes.into_inner();
    let import_maps = engine.import_maps_snapshot();
    let return_types = engine.return_types_snapshot();
    attributes::resolve_placeholders(&mut attributes, &import_maps, &modules, &return_types);

    let mut all_sites = sites.into_inner();
    // Deterministic processing order regardless of worker interleaving.
    all_sites.sort_by(|a, b| {
        (&a.location.file, a.location.row, a.location.col, &a.target).cmp(&(
            &b.location.file,
            b.location.row,
            b.location.col,
            &b.target,
        ))
    });

    let mut builder = CallGraphBuilder::new(config.cache_capacity, config.debug_failure_stats);
    let resolution_cx = ResolutionContext {
        engine: &engine,
        builtins: &builtins,
        attributes: &attributes,
        code_graph,
    };
    let processed = builder.process_all(all_sites, &resolution_cx);
    let resolved = processed.iter().filter(|s| s.resolved).count();
    info!(
        files = files.len(),
        sites = processed.len(),
        resolved,
        iterations,
        "analysis complete"
    );

    let (call_graph, unresolved, failure_stats) = builder.finish();
    Ok(ProjectAnalysis {
        call_graph,
        unresolved,
        failure_stats,
        iterations,
        engine,
        attributes,
        modules,
    })
}

/// Collect the simple names of classes and functions declared in a file.
fn collect_declared(root: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    ast::walk(root, |node| {
        if matches!(node.kind(), "class_definition" | "function_definition") {
            if let Some(name) = node.child_by_field_name("name") {
                names.push(ast::node_text(name, source).to_string());
            }
        }
        true
    });
    names
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use callmap_core::TypeSource;

    #[test]
    fn test_module_path_from_file() {
        assert_eq!(module_path_from_file("myapp/views.py"), "myapp.views");
        assert_eq!(module_path_from_file("./myapp/views.py"), "myapp.views");
        assert_eq!(module_path_from_file("app.py"), "app");
        assert_eq!(module_path_from_file("myapp/__init__.py"), "myapp");
        assert_eq!(
            module_path_from_file("myapp/sub/handler.py"),
            "myapp.sub.handler"
        );
    }

    #[test]
    fn test_single_file_end_to_end() {
        let files = vec![SourceFile::new(
            "app.py",
            "\
class User:
    def __init__(self):
        self.name = \"anon\"

def make_user():
    return User()

def login():
    u = make_user()
    return u
",
        )];
        let analysis =
            analyze_project(&files, &CodeGraph::new(), AnalysisConfig::default()).unwrap();

        // make_user resolves to a local instantiation at 0.8.
        let make_user = analysis.engine.return_type("app.make_user").unwrap();
        assert_eq!(make_user.fqn(), Some("app.User"));
        assert!((make_user.confidence - 0.8).abs() < 1e-6);
        assert_eq!(make_user.source, TypeSource::ClassInstantiationLocal);

        // u propagates at 0.8 × 0.95, and login's return follows it.
        let binding = analysis
            .engine
            .lookup_variable("app.login", "u", None)
            .unwrap();
        assert_eq!(binding.type_info.fqn(), Some("app.User"));
        assert!((binding.type_info.confidence - 0.76).abs() < 1e-4);
        assert_eq!(binding.type_info.source, TypeSource::FunctionCallPropagation);

        let login = analysis.engine.return_type("app.login").unwrap();
        assert_eq!(login.fqn(), Some("app.User"));
        assert!((login.confidence - 0.76).abs() < 1e-4);

        // The call graph carries main edges.
        assert!(analysis
            .call_graph
            .edges()
            .iter()
            .any(|e| e.caller_fqn == "app.login" && e.target_fqn == "app.make_user"));
    }

    #[test]
    fn test_cross_file_propagation() {
        let files = vec![
            SourceFile::new(
                "myapp/models.py",
                "\
class Task:
    def __init__(self):
        self.title = \"\"
",
            ),
            SourceFile::new(
                "myapp/factory.py",
                "\
from myapp.models import Task

def make_task():
    return Task()
",
            ),
            SourceFile::new(
                "myapp/views.py",
                "\
from myapp.factory import make_task

def create():
    t = make_task()
    return t
",
            ),
        ];
        let analysis =
            analyze_project(&files, &CodeGraph::new(), AnalysisConfig::default()).unwrap();

        let make_task = analysis.engine.return_type("myapp.factory.make_task").unwrap();
        assert_eq!(make_task.fqn(), Some("myapp.models.Task"));

        let binding = analysis
            .engine
            .lookup_variable("myapp.views.create", "t", None)
            .unwrap();
        assert_eq!(binding.type_info.fqn(), Some("myapp.models.Task"));
        assert_eq!(
            binding.assigned_from.as_deref(),
            Some("myapp.factory.make_task")
        );
    }

    #[test]
    fn test_deterministic_across_runs() {
        let files = vec![
            SourceFile::new("a.py", "def fa():\n    return 1\nx = fa()\n"),
            SourceFile::new("b.py", "def fb():\n    return \"s\"\ny = fb()\n"),
            SourceFile::new("c.py", "def fc():\n    return []\nz = fc()\n"),
        ];
        let first =
            analyze_project(&files, &CodeGraph::new(), AnalysisConfig::default()).unwrap();
        let second =
            analyze_project(&files, &CodeGraph::new(), AnalysisConfig::default()).unwrap();
        assert_eq!(first.call_graph.edges(), second.call_graph.edges());
    }
}
