//! Per-file import extraction.
//!
//! Produces an [`ImportMap`]: local name → fully qualified name, covering
//! the four recognized forms plus wildcard bookkeeping:
//!
//! - `import x.y`            → `x.y` → `x.y`
//! - `import x.y as z`       → `z` → `x.y` (only the alias is bound)
//! - `from m import n`       → `n` → `m.n`
//! - `from m import n as z`  → `z` → `m.n`
//! - `from . import n` / `from ..pkg import n` → resolved against the
//!   file's module path
//! - `from m import *`       → recorded as a wildcard module
//!
//! Project-internal absolute imports written without the project root
//! (`from utils import helper` inside `myapp/`) are normalized to
//! `myapp.utils.helper` when the registry proves the rooted form exists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::ast::{self, named_children};
use crate::modules::ModuleRegistry;

// ============================================================================
// ImportMap
// ============================================================================

/// Local name → FQN bindings for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportMap {
    entries: HashMap<String, String>,
    /// Modules pulled in via `from m import *`.
    wildcards: Vec<String>,
}

impl ImportMap {
    /// Create an empty map.
    pub fn new() -> Self {
        ImportMap::default()
    }

    /// Bind a local name. Aliases override the original: later bindings
    /// of the same local name win, matching Python shadowing.
    pub fn insert(&mut self, local: impl Into<String>, fqn: impl Into<String>) {
        self.entries.insert(local.into(), fqn.into());
    }

    /// The FQN bound to a local name.
    pub fn resolve(&self, local: &str) -> Option<&str> {
        self.entries.get(local).map(String::as_str)
    }

    /// Resolve the head component of a dotted target: for `m.Cls`, the
    /// binding of `m`.
    pub fn resolve_head<'a>(&'a self, dotted: &str) -> Option<&'a str> {
        let head = dotted.split('.').next().unwrap_or(dotted);
        self.resolve(head)
    }

    /// True if the local name is bound.
    pub fn contains(&self, local: &str) -> bool {
        self.entries.contains_key(local)
    }

    /// Record a wildcard import of `module`.
    pub fn add_wildcard(&mut self, module: impl Into<String>) {
        self.wildcards.push(module.into());
    }

    /// Modules imported via `*`, in source order.
    pub fn wildcards(&self) -> &[String] {
        &self.wildcards
    }

    /// Iterate all `(local, fqn)` bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract every import in the tree into an [`ImportMap`].
///
/// `module_path` is the dotted module path of the file being analyzed
/// (used to resolve relative imports); `registry` supplies project-root
/// normalization.
pub fn extract_imports(
    root: Node<'_>,
    source: &str,
    module_path: &str,
    registry: &ModuleRegistry,
) -> ImportMap {
    let mut map = ImportMap::new();
    ast::walk(root, |node| {
        match node.kind() {
            "import_statement" => {
                collect_import(node, source, &mut map);
                false
            }
            "import_from_statement" => {
                collect_import_from(node, source, module_path, registry, &mut map);
                false
            }
            _ => true,
        }
    });
    map
}

fn collect_import(node: Node<'_>, source: &str, map: &mut ImportMap) {
    for child in named_children(node) {
        match child.kind() {
            "dotted_name" => {
                let name = ast::node_text(child, source);
                if !name.is_empty() {
                    map.insert(name, name);
                }
            }
            "aliased_import" => {
                let (Some(name), Some(alias)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) else {
                    continue;
                };
                map.insert(
                    ast::node_text(alias, source),
                    ast::node_text(name, source),
                );
            }
            _ => {}
        }
    }
}

fn collect_import_from(
    node: Node<'_>,
    source: &str,
    module_path: &str,
    registry: &ModuleRegistry,
    map: &mut ImportMap,
) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };

    let base = match module_node.kind() {
        "relative_import" => resolve_relative_node(module_node, source, module_path),
        _ => {
            let text = ast::node_text(module_node, source);
            normalize_module(text, registry)
        }
    };

    for child in named_children(node) {
        if child.id() == module_node.id() {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => {
                let name = ast::node_text(child, source);
                if !name.is_empty() {
                    map.insert(name, join_fqn(&base, name));
                }
            }
            "aliased_import" => {
                let (Some(name), Some(alias)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) else {
                    continue;
                };
                map.insert(
                    ast::node_text(alias, source),
                    join_fqn(&base, ast::node_text(name, source)),
                );
            }
            "wildcard_import" => {
                map.add_wildcard(base.clone());
            }
            _ => {}
        }
    }
}

fn resolve_relative_node(node: Node<'_>, source: &str, module_path: &str) -> String {
    let mut dots = 0;
    let mut suffix = "";
    for child in named_children(node) {
        match child.kind() {
            "import_prefix" => {
                dots = ast::node_text(child, source).chars().filter(|c| *c == '.').count();
            }
            "dotted_name" => suffix = ast::node_text(child, source),
            _ => {}
        }
    }
    resolve_relative(module_path, dots, suffix)
}

/// Resolve a relative import against the importing file's module path.
///
/// The module path is split on `.`; its last segment (the file itself) is
/// discarded, then `dots - 1` further segments are dropped, clamped at the
/// root; the optional suffix is appended. An empty suffix yields the
/// resulting package path.
pub fn resolve_relative(module_path: &str, dots: usize, suffix: &str) -> String {
    let mut segments: Vec<&str> = module_path.split('.').filter(|s| !s.is_empty()).collect();
    segments.pop();
    let extra = dots.saturating_sub(1);
    let keep = segments.len().saturating_sub(extra);
    segments.truncate(keep);
    let base = segments.join(".");
    join_fqn(&base, suffix)
}

/// Normalize a project-internal absolute import.
///
/// If `name` is not a registered module but `projectRoot.name` is, the
/// rooted form is returned; otherwise `name` is treated as third-party
/// and left unchanged. Idempotent: a name already in the registry comes
/// back untouched.
pub fn normalize_module(name: &str, registry: &ModuleRegistry) -> String {
    if name.is_empty() || registry.contains_module(name) || registry.is_stdlib(name) {
        return name.to_string();
    }
    if let Some(root) = registry.project_root() {
        let rooted = format!("{root}.{name}");
        if registry.contains_module(&rooted) {
            return rooted;
        }
    }
    name.to_string()
}

fn join_fqn(base: &str, suffix: &str) -> String {
    match (base.is_empty(), suffix.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => suffix.to_string(),
        (false, false) => format!("{base}.{suffix}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PythonParser;

    fn extract(source: &str, module_path: &str, registry: &ModuleRegistry) -> ImportMap {
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse(source, "test.py").unwrap();
        extract_imports(tree.root_node(), source, module_path, registry)
    }

    #[test]
    fn test_simple_import() {
        let map = extract("import os\nimport os.path\n", "app.main", &ModuleRegistry::new());
        assert_eq!(map.resolve("os"), Some("os"));
        assert_eq!(map.resolve("os.path"), Some("os.path"));
    }

    #[test]
    fn test_aliased_import_binds_only_alias() {
        let map = extract("import numpy as np\n", "app.main", &ModuleRegistry::new());
        assert_eq!(map.resolve("np"), Some("numpy"));
        assert!(map.resolve("numpy").is_none());
    }

    #[test]
    fn test_from_import() {
        let map = extract(
            "from os.path import join\nfrom json import loads as parse\n",
            "app.main",
            &ModuleRegistry::new(),
        );
        assert_eq!(map.resolve("join"), Some("os.path.join"));
        assert_eq!(map.resolve("parse"), Some("json.loads"));
        assert!(map.resolve("loads").is_none());
    }

    #[test]
    fn test_multiple_names_on_one_line() {
        let map = extract(
            "from collections import OrderedDict, defaultdict as dd\n",
            "app.main",
            &ModuleRegistry::new(),
        );
        assert_eq!(map.resolve("OrderedDict"), Some("collections.OrderedDict"));
        assert_eq!(map.resolve("dd"), Some("collections.defaultdict"));
    }

    #[test]
    fn test_relative_import_resolution() {
        // File at myapp.submodule.handler; `from ..utils import helper`
        // climbs one package above `submodule`.
        let map = extract(
            "from ..utils import helper\n",
            "myapp.submodule.handler",
            &ModuleRegistry::new(),
        );
        assert_eq!(map.resolve("helper"), Some("myapp.utils.helper"));
    }

    #[test]
    fn test_single_dot_relative_import() {
        let map = extract(
            "from .models import Task\n",
            "myapp.views",
            &ModuleRegistry::new(),
        );
        assert_eq!(map.resolve("Task"), Some("myapp.models.Task"));
    }

    #[test]
    fn test_bare_relative_import() {
        let map = extract("from . import siblings\n", "myapp.views", &ModuleRegistry::new());
        assert_eq!(map.resolve("siblings"), Some("myapp.siblings"));
    }

    #[test]
    fn test_relative_depth_law() {
        // For a module path with k segments and d leading dots, the
        // resulting package depth is max(0, k - d).
        for (module_path, dots, expected) in [
            ("a.b.c.d", 1, "a.b.c"),
            ("a.b.c.d", 2, "a.b"),
            ("a.b.c.d", 3, "a"),
            ("a.b.c.d", 4, ""),
            ("a.b.c.d", 9, ""),
            ("a", 1, ""),
        ] {
            assert_eq!(resolve_relative(module_path, dots, ""), expected);
        }
        assert_eq!(resolve_relative("a.b.c", 2, "x.y"), "a.x.y");
    }

    #[test]
    fn test_wildcard_import_recorded() {
        let map = extract("from os.path import *\n", "app.main", &ModuleRegistry::new());
        assert_eq!(map.wildcards(), &["os.path".to_string()]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_project_internal_normalization() {
        let mut registry = ModuleRegistry::new();
        registry.add_module("myapp.utils", "myapp/utils.py");
        registry.add_module("myapp.views", "myapp/views.py");

        let map = extract("from utils import helper\n", "myapp.views", &registry);
        assert_eq!(map.resolve("helper"), Some("myapp.utils.helper"));
    }

    #[test]
    fn test_normalization_is_idempotent_and_skips_third_party() {
        let mut registry = ModuleRegistry::new();
        registry.add_module("myapp.utils", "myapp/utils.py");

        // Already registered: unchanged.
        assert_eq!(normalize_module("myapp.utils", &registry), "myapp.utils");
        // Unknown everywhere: treated as third-party, unchanged.
        assert_eq!(normalize_module("django.db", &registry), "django.db");
        // Stdlib: unchanged even though not "registered".
        assert_eq!(normalize_module("os.path", &registry), "os.path");
    }

    #[test]
    fn test_alias_overrides_original() {
        let map = extract(
            "from app import Handler\nfrom app2 import Thing as Handler\n",
            "app.main",
            &ModuleRegistry::new(),
        );
        assert_eq!(map.resolve("Handler"), Some("app2.Thing"));
    }

    #[test]
    fn test_resolve_head_of_dotted_target() {
        let map = extract("import models\n", "app.main", &ModuleRegistry::new());
        assert_eq!(map.resolve_head("models.Task"), Some("models"));
        assert!(map.resolve_head("missing.Task").is_none());
    }
}
