//! Call graph construction.
//!
//! Consumes extracted call sites, dispatches them through the resolution
//! strategies in priority order, and appends typed edges. Analysis gaps
//! never raise: a site either contributes an edge or is retained
//! unresolved with a failure-reason tag, aggregated in [`FailureStats`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use callmap_core::{CallEdge, CallGraph, FailureReason, TypeInfo, TypeSource};

use crate::store::{CacheKey, TypeCache};
use crate::strategies::{default_strategies, ResolutionContext, ResolutionStrategy};
use crate::types::CallSite;

// ============================================================================
// Failure Statistics
// ============================================================================

/// Sample capacity per failure bucket. Older samples win; later ones are
/// dropped once the bucket is full.
const SAMPLE_CAPACITY: usize = 20;

/// Per-reason counters with bounded sample reservoirs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureStats {
    counters: HashMap<FailureReason, u64>,
    samples: HashMap<FailureReason, Vec<String>>,
}

impl FailureStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        FailureStats::default()
    }

    /// Record one failure; the sample is kept only while the bucket has
    /// room (first-20-wins).
    pub fn record(&mut self, reason: FailureReason, sample: &str) {
        *self.counters.entry(reason).or_default() += 1;
        let bucket = self.samples.entry(reason).or_default();
        if bucket.len() < SAMPLE_CAPACITY {
            bucket.push(sample.to_string());
        }
    }

    /// Failure count for a reason.
    pub fn count(&self, reason: FailureReason) -> u64 {
        self.counters.get(&reason).copied().unwrap_or(0)
    }

    /// Retained samples for a reason.
    pub fn samples(&self, reason: FailureReason) -> &[String] {
        self.samples.get(&reason).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total failures across all reasons.
    pub fn total(&self) -> u64 {
        self.counters.values().sum()
    }
}

// ============================================================================
// Resolve Outcome
// ============================================================================

/// Answer for a single call site: the target (when resolution succeeded),
/// whether it resolved, and the backing type inference. The type is never
/// absent — "unknown" is an explicit value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_fqn: Option<String>,
    pub resolved: bool,
    pub type_info: TypeInfo,
}

// ============================================================================
// Call Graph Builder
// ============================================================================

/// Builds the call graph by dispatching sites through the strategy list.
pub struct CallGraphBuilder {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    graph: CallGraph,
    stats: FailureStats,
    cache: TypeCache,
    unresolved: Vec<CallSite>,
    debug_failure_stats: bool,
}

impl CallGraphBuilder {
    /// Create a builder with the default strategy set.
    pub fn new(cache_capacity: usize, debug_failure_stats: bool) -> Self {
        CallGraphBuilder {
            strategies: default_strategies(),
            graph: CallGraph::new(),
            stats: FailureStats::new(),
            cache: TypeCache::new(cache_capacity),
            unresolved: Vec::new(),
            debug_failure_stats,
        }
    }

    /// Replace the strategy set (kept sorted by descending priority).
    pub fn with_strategies(mut self, mut strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        strategies.sort_by(|a, b| b.priority().cmp(&a.priority()));
        self.strategies = strategies;
        self
    }

    /// Resolve one call site without mutating builder state. Returns the
    /// outcome plus the failure reason when every applicable strategy
    /// declined.
    pub fn resolve(
        &self,
        site: &CallSite,
        cx: &ResolutionContext<'_>,
    ) -> (ResolveOutcome, Option<FailureReason>) {
        let mut last_failure = None;
        for strategy in &self.strategies {
            if !strategy.can_handle(site) {
                continue;
            }
            trace!(strategy = strategy.name(), target = %site.target, "trying strategy");
            match strategy.resolve(site, cx) {
                Ok(resolution) if resolution.type_info.source == TypeSource::Unknown => {
                    // The fallback answered "unknown type": dispatch ends,
                    // no edge material.
                    return (
                        ResolveOutcome {
                            target_fqn: None,
                            resolved: false,
                            type_info: resolution.type_info,
                        },
                        last_failure,
                    );
                }
                Ok(resolution) => {
                    debug!(
                        strategy = strategy.name(),
                        target = %site.target,
                        target_fqn = %resolution.target_fqn,
                        confidence = resolution.type_info.confidence,
                        "resolved call site"
                    );
                    return (
                        ResolveOutcome {
                            target_fqn: Some(resolution.target_fqn),
                            resolved: true,
                            type_info: resolution.type_info,
                        },
                        None,
                    );
                }
                Err(reason) => {
                    trace!(strategy = strategy.name(), %reason, "strategy failed");
                    last_failure = Some(reason);
                }
            }
        }
        (
            ResolveOutcome {
                target_fqn: None,
                resolved: false,
                type_info: TypeInfo::unknown(),
            },
            last_failure,
        )
    }

    /// Process one site: resolve, record the edge or the failure, and
    /// return the updated site.
    pub fn process_site(&mut self, mut site: CallSite, cx: &ResolutionContext<'_>) -> CallSite {
        let (outcome, failure) = self.resolve(&site, cx);

        let key = CacheKey::node(
            site.location.file.clone(),
            "call",
            site.location.row,
            site.location.col,
        );
        self.cache.put(key, outcome.type_info.clone());

        if outcome.resolved {
            let target_fqn = outcome.target_fqn.expect("resolved outcome carries a target");
            self.graph.add_edge(CallEdge::new(
                site.caller_fqn.clone(),
                target_fqn.clone(),
                outcome.type_info.confidence,
                outcome.type_info.source,
            ));
            site.resolved = true;
            site.target_fqn = Some(target_fqn);
        } else {
            site.resolved = false;
            site.failure = failure;
            if let Some(reason) = failure {
                let sample = if self.debug_failure_stats {
                    format!("{} at {}", site.target, site.location)
                } else {
                    site.target.clone()
                };
                self.stats.record(reason, &sample);
            }
            self.unresolved.push(site.clone());
        }
        site
    }

    /// Process a batch of sites in order.
    pub fn process_all(
        &mut self,
        sites: Vec<CallSite>,
        cx: &ResolutionContext<'_>,
    ) -> Vec<CallSite> {
        sites
            .into_iter()
            .map(|site| self.process_site(site, cx))
            .collect()
    }

    /// The finished call graph.
    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    /// Failure statistics (debug accessor).
    pub fn failure_stats(&self) -> &FailureStats {
        &self.stats
    }

    /// Sites retained unresolved, in processing order.
    pub fn unresolved(&self) -> &[CallSite] {
        &self.unresolved
    }

    /// Cached type for a previously processed site location.
    pub fn cached_type(&self, file: &str, row: u32, col: u32) -> Option<TypeInfo> {
        self.cache.get(&CacheKey::node(file, "call", row, col))
    }

    /// Consume the builder, yielding the graph, the unresolved sites, and
    /// the failure statistics.
    pub fn finish(self) -> (CallGraph, Vec<CallSite>, FailureStats) {
        (self.graph, self.unresolved, self.stats)
    }
}

// ============================================================================
// Tests
// ============================================================================
