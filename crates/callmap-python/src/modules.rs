//! Module registry: file paths ↔ module paths, short-name index,
//! project-root detection.
//!
//! Built once per project before extraction starts (the traversal that
//! discovers files lives outside this crate). Import resolution uses it to
//! turn dot-form textual imports into canonical FQNs, and the attribute
//! placeholder pass uses the short-name index to find classes by simple
//! name.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Top-level stdlib modules recognized when classifying imports.
const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "collections", "contextlib", "copy", "csv",
    "dataclasses", "datetime", "enum", "functools", "glob", "hashlib", "io", "itertools", "json",
    "logging", "math", "os", "pathlib", "pickle", "random", "re", "shutil", "socket", "sqlite3",
    "string", "struct", "subprocess", "sys", "tempfile", "threading", "time", "traceback",
    "typing", "unittest", "urllib", "uuid", "warnings", "xml",
];

// ============================================================================
// ModuleRegistry
// ============================================================================

/// Maps between module paths and file paths for the analyzed project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRegistry {
    /// module path (`myapp.views`) → file path (`myapp/views.py`).
    modules: HashMap<String, String>,
    /// file path → module path.
    file_to_module: HashMap<String, String>,
    /// simple declared name (`Task`) → files that declare it.
    short_names: HashMap<String, Vec<String>>,
    /// Known stdlib top-level module names.
    stdlib: HashSet<String>,
    /// Caller-supplied project root, overriding detection.
    root_override: Option<String>,
}

impl ModuleRegistry {
    /// Create an empty registry with the stdlib set preloaded.
    pub fn new() -> Self {
        ModuleRegistry {
            modules: HashMap::new(),
            file_to_module: HashMap::new(),
            short_names: HashMap::new(),
            stdlib: STDLIB_MODULES.iter().map(|s| (*s).to_string()).collect(),
            root_override: None,
        }
    }

    /// Pin the project root instead of detecting it.
    pub fn set_project_root_override(&mut self, root: impl Into<String>) {
        self.root_override = Some(root.into());
    }

    /// Register a module path ↔ file path pair.
    pub fn add_module(&mut self, module_path: impl Into<String>, file_path: impl Into<String>) {
        let module_path = module_path.into();
        let file_path = file_path.into();
        self.file_to_module
            .insert(file_path.clone(), module_path.clone());
        self.modules.insert(module_path, file_path);
    }

    /// Module path for a registered file.
    pub fn get_module_path(&self, file_path: &str) -> Option<&str> {
        self.file_to_module.get(file_path).map(String::as_str)
    }

    /// File path for a registered module.
    pub fn get_file(&self, module_path: &str) -> Option<&str> {
        self.modules.get(module_path).map(String::as_str)
    }

    /// True if the module path is registered.
    pub fn contains_module(&self, module_path: &str) -> bool {
        self.modules.contains_key(module_path)
    }

    /// Record that `file_path` declares the simple name `name`.
    pub fn add_short_name(&mut self, name: impl Into<String>, file_path: impl Into<String>) {
        let files = self.short_names.entry(name.into()).or_default();
        let file_path = file_path.into();
        if !files.contains(&file_path) {
            files.push(file_path);
        }
    }

    /// Files that declare the simple name `name`.
    pub fn short_name_lookup(&self, name: &str) -> &[String] {
        self.short_names
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The project root: the configured override when set, otherwise the
    /// most common first component across registered module paths, ties
    /// broken lexicographically so the answer does not depend on
    /// extraction order.
    pub fn project_root(&self) -> Option<String> {
        if let Some(root) = &self.root_override {
            return Some(root.clone());
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for module_path in self.modules.keys() {
            let head = module_path.split('.').next().unwrap_or(module_path);
            *counts.entry(head).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|(a_name, a_count), (b_name, b_count)| {
                a_count.cmp(b_count).then(b_name.cmp(a_name))
            })
            .map(|(name, _)| name.to_string())
    }

    /// True if `name`'s head component is a known stdlib module.
    pub fn is_stdlib(&self, name: &str) -> bool {
        let head = name.split('.').next().unwrap_or(name);
        self.stdlib.contains(head)
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
