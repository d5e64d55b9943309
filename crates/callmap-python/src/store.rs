//! Scope-stacked type bindings and the LRU node-result cache.
//!
//! [`TypeStore`] is a stack of scope frames used while resolving a single
//! call site: lookup walks innermost-out, update writes to the frame that
//! declared the variable, and the designated root frame can never be
//! popped.
//!
//! [`TypeCache`] memoizes per-node inference results keyed by
//! `(file, node kind, row, col, variable)`. Entries are tagged by file so
//! a re-parse can invalidate in bulk; eviction is silent.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use callmap_core::TypeInfo;

// ============================================================================
// TypeStore
// ============================================================================

/// One frame of the scope stack.
#[derive(Debug, Clone)]
struct ScopeFrame {
    name: String,
    bindings: std::collections::HashMap<String, TypeInfo>,
}

/// Hierarchical variable→type store with a protected root frame.
#[derive(Debug)]
pub struct TypeStore {
    frames: Vec<ScopeFrame>,
}

impl TypeStore {
    /// Create a store with a root frame of the given name.
    pub fn new(root_name: impl Into<String>) -> Self {
        TypeStore {
            frames: vec![ScopeFrame {
                name: root_name.into(),
                bindings: std::collections::HashMap::new(),
            }],
        }
    }

    /// Push a nested scope.
    pub fn push_scope(&mut self, name: impl Into<String>) {
        self.frames.push(ScopeFrame {
            name: name.into(),
            bindings: std::collections::HashMap::new(),
        });
    }

    /// Pop the innermost scope. The root frame stays; returns whether a
    /// frame was actually popped.
    pub fn pop_scope(&mut self) -> bool {
        if self.frames.len() > 1 {
            self.frames.pop();
            true
        } else {
            false
        }
    }

    /// Declare (or redeclare) a variable in the innermost scope.
    pub fn declare(&mut self, name: impl Into<String>, info: TypeInfo) {
        let frame = self.frames.last_mut().expect("root frame always present");
        frame.bindings.insert(name.into(), info);
    }

    /// Look up a variable, walking innermost-out.
    pub fn lookup(&self, name: &str) -> Option<&TypeInfo> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Update a variable in whichever frame declared it. Returns false
    /// when the variable is undeclared everywhere.
    pub fn update(&mut self, name: &str, info: TypeInfo) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.bindings.get_mut(name) {
                *slot = info;
                return true;
            }
        }
        false
    }

    /// Name of the innermost scope.
    pub fn current_scope(&self) -> &str {
        &self.frames.last().expect("root frame always present").name
    }

    /// Current stack depth (root counts as 1).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

// ============================================================================
// TypeCache
// ============================================================================

/// Key for one cached node inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file: String,
    pub node_kind: String,
    pub row: u32,
    pub col: u32,
    pub var_name: Option<String>,
}

impl CacheKey {
    /// Create a key without a variable component.
    pub fn node(file: impl Into<String>, node_kind: impl Into<String>, row: u32, col: u32) -> Self {
        CacheKey {
            file: file.into(),
            node_kind: node_kind.into(),
            row,
            col,
            var_name: None,
        }
    }

    /// Attach a variable name to the key.
    pub fn with_var(mut self, var_name: impl Into<String>) -> Self {
        self.var_name = Some(var_name.into());
        self
    }
}

/// Bounded LRU cache of node inference results.
///
/// Kept behind its own mutex so opportunistic concurrent queries from
/// higher-level passes stay safe; operations are short.
#[derive(Debug)]
pub struct TypeCache {
    entries: Mutex<LruCache<CacheKey, TypeInfo>>,
}

impl TypeCache {
    /// Create a cache with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is nonzero");
        TypeCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a cached result, refreshing its recency.
    pub fn get(&self, key: &CacheKey) -> Option<TypeInfo> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert a result, evicting the least recently used entry if full.
    pub fn put(&self, key: CacheKey, info: TypeInfo) {
        self.entries.lock().put(key, info);
    }

    /// Drop every entry tagged with `file` (bulk invalidation after a
    /// re-parse).
    pub fn invalidate_file(&self, file: &str) {
        let mut entries = self.entries.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.file == file)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
