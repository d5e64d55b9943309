//! Method-chain resolution.
//!
//! A chain is any call-site target containing `).` — a call immediately
//! followed by attribute access, like `create_builder().append("x").upper`.
//! Parsing splits the target into ordered steps while tracking parentheses
//! and quoted regions, so arguments containing dots or commas do not split
//! steps.
//!
//! Resolution walks left-to-right threading a current type:
//!
//! 1. builtin types consult the builtin registry
//! 2. `strip_last_segment(T).m` — the class-method-as-module-function form
//! 3. `T.m` directly
//! 4. method declared but without a recorded return type → fluent
//! 5. heuristic fluent fallback when incoming confidence is high enough
//!
//! The final confidence is the product of per-step confidences. A
//! placeholder type at the first step is always a chain failure
//! (`first_step_unresolved`, retryable on the next iteration).

use callmap_core::{CodeGraph, FailureReason, TypeInfo, TypeSource};
use tracing::trace;

use crate::builtins::BuiltinRegistry;
use crate::engine::InferenceEngine;
use crate::instantiate;
use crate::store::TypeStore;
use crate::types::Resolution;

// ============================================================================
// Chain Parsing
// ============================================================================

/// One step of a parsed chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    /// Full segment text, e.g. `append("x")`.
    pub expression: String,
    /// The identifier being read or called, e.g. `append`.
    pub method_name: String,
    /// True when the segment carries an argument list.
    pub is_call: bool,
}

/// Split a chain target into steps at top-level dots.
pub fn parse_chain(target: &str) -> Vec<ChainStep> {
    let bytes = target.as_bytes();
    let mut steps = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut prev = 0u8;
    let mut start = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q && prev != b'\\' {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b'.' if depth == 0 => {
                    push_step(&target[start..i], &mut steps);
                    start = i + 1;
                }
                _ => {}
            }
        }
        prev = b;
    }
    push_step(&target[start..], &mut steps);
    steps
}

fn push_step(segment: &str, steps: &mut Vec<ChainStep>) {
    let segment = segment.trim();
    if segment.is_empty() {
        return;
    }
    let (name, is_call) = match segment.find('(') {
        Some(open) => (segment[..open].trim(), true),
        None => (segment, false),
    };
    steps.push(ChainStep {
        expression: segment.to_string(),
        method_name: name.to_string(),
        is_call,
    });
}

// ============================================================================
// Chain Resolution
// ============================================================================

/// Collaborators chain resolution reads from.
pub struct ChainContext<'a> {
    pub engine: &'a InferenceEngine,
    pub builtins: &'a BuiltinRegistry,
    pub code_graph: &'a CodeGraph,
}

/// Resolve a chain target within the given caller scope.
///
/// `row` is the call site's row, used for line-aware binding lookup when
/// the first step is a variable.
pub fn resolve_chain(
    target: &str,
    caller_fqn: &str,
    row: Option<u32>,
    cx: &ChainContext<'_>,
) -> Result<Resolution, FailureReason> {
    let steps = parse_chain(target);
    if steps.is_empty() {
        return Err(FailureReason::FirstStepUnresolved);
    }

    let mut current = resolve_first_step(&steps[0], caller_fqn, row, cx)?;
    let mut target_fqn = current
        .fqn()
        .map(str::to_string)
        .unwrap_or_default();
    let mut last_source = current.source;

    for step in &steps[1..] {
        let (next, step_fqn, source) = resolve_step(&current, step, cx)?;
        trace!(
            method = %step.method_name,
            type_fqn = %next.type_ref,
            confidence = next.confidence,
            "chain step"
        );
        current = next;
        target_fqn = step_fqn;
        last_source = source;
    }

    Ok(Resolution::new(target_fqn, current.with_source(last_source)))
}

/// Resolve step 0: a call's return type, an inline instantiation, or a
/// variable looked up through the scope stack (module scope as fallback).
/// Placeholders here are fatal for the chain.
fn resolve_first_step(
    step: &ChainStep,
    caller_fqn: &str,
    row: Option<u32>,
    cx: &ChainContext<'_>,
) -> Result<TypeInfo, FailureReason> {
    if step.is_call {
        // Inline instantiation: `Cls(args).method()`.
        if instantiate::is_instantiation_target(&step.method_name) {
            let module = cx.engine.module_path_of(caller_fqn);
            let imports = cx
                .engine
                .modules()
                .get_file(&module)
                .and_then(|file| cx.engine.import_map(file))
                .unwrap_or_default();
            if let Some(info) = instantiate::resolve_instantiation(
                &step.method_name,
                &module,
                &imports,
                cx.engine.modules(),
            ) {
                return Ok(info);
            }
        }

        // Builtin constructor.
        if let Some(fqn) = cx.builtins.constructor_type(&step.method_name) {
            return Ok(TypeInfo::concrete(fqn, 0.9, TypeSource::Builtin));
        }

        // User function or imported/stdlib callable.
        let callee = cx.engine.qualify_callee(&step.method_name, caller_fqn);
        if let Some(ret) = cx.engine.return_type(&callee) {
            if ret.is_concrete() {
                return Ok(ret);
            }
            // A placeholder first step never anchors a chain.
            return Err(FailureReason::FirstStepUnresolved);
        }
        if let Some(ret) = cx.builtins.stdlib_return(&callee) {
            return Ok(TypeInfo::concrete(ret, 0.9, TypeSource::Stdlib));
        }
        return Err(FailureReason::FirstStepUnresolved);
    }

    // Bare identifier: scope stack lookup, module scope as fallback.
    let store = scope_store(cx.engine, caller_fqn, row);
    let info = store
        .lookup(&step.method_name)
        .ok_or(FailureReason::FirstStepUnresolved)?;
    if !info.is_concrete() {
        return Err(FailureReason::FirstStepUnresolved);
    }
    Ok(info.clone())
}

/// Build the scope stack for a chain: the module frame at the root, the
/// caller's frame on top, each holding the binding in effect at `row`.
fn scope_store(engine: &InferenceEngine, caller_fqn: &str, row: Option<u32>) -> TypeStore {
    let module = engine.module_path_of(caller_fqn);
    let mut store = TypeStore::new(module.clone());

    let fill = |store: &mut TypeStore, scope_fqn: &str| {
        if let Some(scope) = engine.scope(scope_fqn) {
            for name in scope.variables.keys() {
                let binding = match row {
                    Some(row) => scope.binding_at(name, row),
                    None => scope.current_binding(name),
                };
                if let Some(binding) = binding {
                    store.declare(name.clone(), binding.type_info.clone());
                }
            }
        }
    };

    fill(&mut store, &module);
    if caller_fqn != module {
        store.push_scope(caller_fqn);
        fill(&mut store, caller_fqn);
    }
    store
}

/// Resolve one step after the first. Returns the new current type, the
/// step's method FQN, and the source tag describing how it resolved.
fn resolve_step(
    current: &TypeInfo,
    step: &ChainStep,
    cx: &ChainContext<'_>,
) -> Result<(TypeInfo, String, TypeSource), FailureReason> {
    let config = cx.engine.config();
    let type_fqn = current.fqn().unwrap_or_default().to_string();
    let method = &step.method_name;

    // Builtin receiver: the registry is authoritative when it knows the
    // method; unknown builtin methods fall through to the fluent rules.
    if cx.builtins.is_builtin(&type_fqn) {
        if let Some(found) = cx.builtins.get_method(&type_fqn, method) {
            let next = TypeInfo::concrete(
                found.return_type_fqn.clone(),
                current.confidence,
                TypeSource::MethodChain,
            );
            return Ok((next, format!("{type_fqn}.{method}"), TypeSource::MethodChain));
        }
        let next = current.scaled(config.fluent_no_return_factor);
        return Ok((
            next.with_source(TypeSource::MethodChainFluent),
            format!("{type_fqn}.{method}"),
            TypeSource::MethodChainFluent,
        ));
    }

    // Class-method-as-module-function lookup, then the direct form.
    let stripped = strip_last_segment(&type_fqn);
    let candidates = [format!("{stripped}.{method}"), format!("{type_fqn}.{method}")];
    for candidate in &candidates {
        let Some(ret) = cx.engine.return_type(candidate) else {
            continue;
        };
        if let Some(ret_fqn) = ret.fqn() {
            let next = TypeInfo::concrete(
                ret_fqn,
                current.confidence * ret.confidence,
                TypeSource::MethodChain,
            );
            return Ok((next, candidate.clone(), TypeSource::MethodChain));
        }
        // `var:self` / `call:` return: fluent interface, the receiver
        // type flows through.
        let next = current.scaled(config.fluent_with_hint_factor);
        return Ok((
            next.with_source(TypeSource::MethodChainFluent),
            candidate.clone(),
            TypeSource::MethodChainFluent,
        ));
    }

    // Declared in the code graph without a recorded return type.
    for candidate in &candidates {
        if cx.code_graph.is_callable(candidate) {
            let next = current.scaled(config.fluent_no_return_factor);
            return Ok((
                next.with_source(TypeSource::MethodChainFluent),
                candidate.clone(),
                TypeSource::MethodChainFluent,
            ));
        }
    }

    // Heuristic fallback: assume fluent only on a confident receiver.
    if current.confidence >= 0.7 {
        let next = current.scaled(config.fluent_heuristic_factor);
        return Ok((
            next.with_source(TypeSource::MethodChainHeuristic),
            format!("{type_fqn}.{method}"),
            TypeSource::MethodChainHeuristic,
        ));
    }

    Err(FailureReason::CustomClassUnsupported)
}

fn strip_last_segment(fqn: &str) -> &str {
    fqn.rsplit_once('.').map(|(head, _)| head).unwrap_or(fqn)
}

// ============================================================================
// Tests
// ============================================================================
