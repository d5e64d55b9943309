//! The type inference engine: shared state plus fixed-point propagation.
//!
//! The engine aggregates what Phase A extracted from every file — function
//! scopes, per-function return types, per-file import maps — behind three
//! independent read-write locks. Phase B then runs propagation over the
//! fully populated maps:
//!
//! - iteration 1 substitutes `call:F` placeholders whose callee's return
//!   type is already concrete, and `var:V` placeholders whose source
//!   binding is concrete
//! - further iterations re-run the same step until nothing changes or the
//!   configured bound is hit; the `call:` dependency graph is acyclic in
//!   well-formed code, the bound catches pathological cycles
//!
//! Because every file contributes to the same maps, a function's return
//! type becomes visible to all callers once its file is extracted; the
//! extraction phase is embarrassingly parallel, propagation is
//! single-threaded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use callmap_core::{AnalysisConfig, TypeInfo, TypeRef, TypeSource};

use crate::imports::ImportMap;
use crate::modules::ModuleRegistry;
use crate::returns::ReturnExtraction;
use crate::types::{FunctionScope, VariableBinding};

// ============================================================================
// Engine
// ============================================================================

/// Shared inference state for one analysis run.
pub struct InferenceEngine {
    config: AnalysisConfig,
    modules: Arc<ModuleRegistry>,
    scopes: RwLock<HashMap<String, FunctionScope>>,
    return_types: RwLock<HashMap<String, TypeInfo>>,
    import_maps: RwLock<HashMap<String, ImportMap>>,
    functions_with_returns: RwLock<HashSet<String>>,
}

impl InferenceEngine {
    /// Create an engine over a built module registry.
    pub fn new(config: AnalysisConfig, modules: Arc<ModuleRegistry>) -> Self {
        InferenceEngine {
            config,
            modules,
            scopes: RwLock::new(HashMap::new()),
            return_types: RwLock::new(HashMap::new()),
            import_maps: RwLock::new(HashMap::new()),
            functions_with_returns: RwLock::new(HashSet::new()),
        }
    }

    /// The configuration this engine runs under.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The module registry this engine resolves against.
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    // ------------------------------------------------------------------------
    // Phase A: registration
    // ------------------------------------------------------------------------

    /// Merge one file's extraction results. Called concurrently by
    /// extraction workers; each map takes its own short write lock.
    pub fn register_file(
        &self,
        file: &str,
        imports: ImportMap,
        returns: ReturnExtraction,
        scopes: HashMap<String, FunctionScope>,
    ) {
        self.import_maps.write().insert(file.to_string(), imports);
        {
            let mut return_types = self.return_types.write();
            for (fqn, info) in returns.return_types {
                return_types.insert(fqn, info);
            }
        }
        self.functions_with_returns
            .write()
            .extend(returns.functions_with_returns);
        let mut all_scopes = self.scopes.write();
        for (fqn, scope) in scopes {
            all_scopes.insert(fqn, scope);
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Merged return type of a function, if recorded.
    pub fn return_type(&self, function_fqn: &str) -> Option<TypeInfo> {
        self.return_types.read().get(function_fqn).cloned()
    }

    /// True when the function contains at least one `return <expr>` —
    /// distinguishing an unknown return type from a genuinely void
    /// function.
    pub fn has_value_return(&self, function_fqn: &str) -> bool {
        self.functions_with_returns.read().contains(function_fqn)
    }

    /// Snapshot of one scope.
    pub fn scope(&self, function_fqn: &str) -> Option<FunctionScope> {
        self.scopes.read().get(function_fqn).cloned()
    }

    /// Snapshot of one file's import map.
    pub fn import_map(&self, file: &str) -> Option<ImportMap> {
        self.import_maps.read().get(file).cloned()
    }

    /// Number of registered scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.read().len()
    }

    /// Snapshot of the full return-type map.
    pub fn return_types_snapshot(&self) -> HashMap<String, TypeInfo> {
        self.return_types.read().clone()
    }

    /// Snapshot of every file's import map.
    pub fn import_maps_snapshot(&self) -> HashMap<String, ImportMap> {
        self.import_maps.read().clone()
    }

    /// Look up a variable binding: the enclosing scope first (line-aware
    /// when a row is given), then the module-level scope as fallback.
    pub fn lookup_variable(
        &self,
        scope_fqn: &str,
        name: &str,
        row: Option<u32>,
    ) -> Option<VariableBinding> {
        let scopes = self.scopes.read();
        let find = |scope: &FunctionScope| match row {
            Some(row) => scope.binding_at(name, row).cloned(),
            None => scope.current_binding(name).cloned(),
        };
        if let Some(scope) = scopes.get(scope_fqn) {
            if let Some(binding) = find(scope) {
                return Some(binding);
            }
        }
        let module = self.module_path_of(scope_fqn);
        if module != scope_fqn {
            if let Some(scope) = scopes.get(&module) {
                return find(scope);
            }
        }
        None
    }

    /// The module path enclosing a function FQN: the longest registered
    /// module prefix, or everything up to the last dot when the registry
    /// has no answer.
    pub fn module_path_of(&self, function_fqn: &str) -> String {
        let segments: Vec<&str> = function_fqn.split('.').collect();
        for end in (1..=segments.len()).rev() {
            let candidate = segments[..end].join(".");
            if self.modules.contains_module(&candidate) {
                return candidate;
            }
        }
        match function_fqn.rsplit_once('.') {
            Some((head, _)) => head.to_string(),
            None => function_fqn.to_string(),
        }
    }

    /// Resolve a textual callee within a scope to its FQN: import map
    /// first, then qualification by the enclosing module path.
    pub fn qualify_callee(&self, callee: &str, scope_fqn: &str) -> String {
        let module = self.module_path_of(scope_fqn);
        let import_maps = self.import_maps.read();
        let imports = self
            .modules
            .get_file(&module)
            .and_then(|file| import_maps.get(file));
        if let Some(imports) = imports {
            let resolved = crate::infer::resolve_callee_fqn(callee, imports);
            if resolved != callee {
                return resolved;
            }
        }
        if callee.contains('.') {
            callee.to_string()
        } else {
            format!("{module}.{callee}")
        }
    }

    // ------------------------------------------------------------------------
    // Phase B: fixed-point propagation
    // ------------------------------------------------------------------------

    /// Run placeholder substitution to a fixed point. Returns the number
    /// of passes executed; the terminal pass is the one that changed
    /// nothing (or the configured bound).
    pub fn propagate(&self) -> u32 {
        let max = self.config.max_fixed_point_iterations.max(1);
        let mut iterations = 0;
        while iterations < max {
            iterations += 1;
            let changed = self.propagate_once();
            debug!(iteration = iterations, changed, "propagation pass");
            if !changed {
                break;
            }
        }
        iterations
    }

    /// One substitution pass over every binding and return entry.
    fn propagate_once(&self) -> bool {
        let mut changed = false;
        let return_snapshot = self.return_types.read().clone();
        let factor = self.config.confidence_propagation_factor;

        // Pass over scope bindings.
        {
            let mut scopes = self.scopes.write();
            let mut keys: Vec<String> = scopes.keys().cloned().collect();
            keys.sort();
            for key in keys {
                // Substitutions read sibling bindings from the same scope,
                // so work on a snapshot and store it back when it changed.
                let Some(scope) = scopes.get(&key).cloned() else { continue };
                let mut updated = scope.clone();
                let mut scope_changed = false;

                let mut names: Vec<String> = updated.variables.keys().cloned().collect();
                names.sort();
                for name in names {
                    let history = updated.variables.get(&name).cloned().unwrap_or_default();
                    for (idx, binding) in history.iter().enumerate() {
                        let substituted = match &binding.type_info.type_ref {
                            TypeRef::Call(func) => self.substitute_call(
                                func,
                                &key,
                                &scope,
                                binding,
                                &return_snapshot,
                                factor,
                            ),
                            TypeRef::Var(var) => {
                                self.substitute_var(var, &scope, binding, factor)
                            }
                            _ => None,
                        };
                        if let Some((info, assigned_from)) = substituted {
                            trace!(
                                scope = %key,
                                var = %name,
                                type_fqn = %info.type_ref,
                                "substituted binding placeholder"
                            );
                            let slot = &mut updated
                                .variables
                                .get_mut(&name)
                                .expect("history present")[idx];
                            slot.type_info = info;
                            slot.assigned_from = assigned_from;
                            scope_changed = true;
                        }
                    }
                }
                if scope_changed {
                    scopes.insert(key, updated);
                    changed = true;
                }
            }
        }

        // Pass over return-type placeholders.
        {
            let scopes = self.scopes.read();
            let mut return_types = self.return_types.write();
            let mut keys: Vec<String> = return_types.keys().cloned().collect();
            keys.sort();
            for key in keys {
                let Some(info) = return_types.get(&key) else { continue };
                let replacement = match &info.type_ref {
                    TypeRef::Var(var) => scopes.get(&key).and_then(|scope| {
                        let binding = scope.current_binding(var)?;
                        binding
                            .type_info
                            .is_concrete()
                            .then(|| binding.type_info.clone())
                    }),
                    TypeRef::Call(func) => {
                        let scope = scopes.get(&key);
                        let binding_stub = VariableBinding::new(
                            "",
                            info.clone(),
                            Default::default(),
                        );
                        scope
                            .and_then(|s| {
                                self.substitute_call(
                                    func,
                                    &key,
                                    s,
                                    &binding_stub,
                                    &return_snapshot,
                                    factor,
                                )
                            })
                            .or_else(|| {
                                // Function body had no bindings at all:
                                // still try module-level resolution.
                                let target = self.qualify_callee(func, &key);
                                return_snapshot
                                    .get(&target)
                                    .filter(|t| t.is_concrete())
                                    .map(|t| {
                                        (
                                            t.scaled(factor)
                                                .with_source(TypeSource::FunctionCallPropagation),
                                            Some(target.clone()),
                                        )
                                    })
                            })
                            .map(|(info, _)| info)
                    }
                    _ => None,
                };
                if let Some(new_info) = replacement {
                    trace!(function = %key, type_fqn = %new_info.type_ref, "resolved return placeholder");
                    return_types.insert(key, new_info);
                    changed = true;
                }
            }
        }

        changed
    }

    /// Substitute one `call:F` placeholder. Returns the replacement type
    /// and the resolved callee FQN, or `None` to leave the binding for a
    /// later iteration.
    fn substitute_call(
        &self,
        func: &str,
        scope_fqn: &str,
        scope: &FunctionScope,
        binding: &VariableBinding,
        return_types: &HashMap<String, TypeInfo>,
        factor: f32,
    ) -> Option<(TypeInfo, Option<String>)> {
        let (target, receiver_confidence) = match func.split_once('.') {
            Some((receiver, method)) => {
                match scope.binding_at(receiver, binding.location.row) {
                    Some(receiver_binding) => {
                        match receiver_binding.type_info.fqn() {
                            Some(t) => {
                                (format!("{t}.{method}"), receiver_binding.type_info.confidence)
                            }
                            // Receiver still a placeholder: reconsider in
                            // the next iteration.
                            None => return None,
                        }
                    }
                    // Not a variable: module-qualified function.
                    None => (self.qualify_callee(func, scope_fqn), 1.0),
                }
            }
            None => (self.qualify_callee(func, scope_fqn), 1.0),
        };

        let resolved = return_types.get(&target)?;
        if !resolved.is_concrete() {
            return None;
        }
        let confidence = resolved.confidence * receiver_confidence * factor;
        Some((
            TypeInfo::new(
                resolved.type_ref.clone(),
                confidence,
                TypeSource::FunctionCallPropagation,
            ),
            Some(target),
        ))
    }

    /// Substitute one `var:V` placeholder from the source variable's
    /// binding in effect at the assignment's line.
    fn substitute_var(
        &self,
        var: &str,
        scope: &FunctionScope,
        binding: &VariableBinding,
        factor: f32,
    ) -> Option<(TypeInfo, Option<String>)> {
        let source_binding = scope.binding_at(var, binding.location.row)?;
        if !source_binding.type_info.is_concrete() {
            return None;
        }
        let info = source_binding
            .type_info
            .scaled(factor)
            .with_source(TypeSource::Assignment);
        Some((info, source_binding.assigned_from.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
