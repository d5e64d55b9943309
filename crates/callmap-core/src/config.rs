//! Analysis configuration.

use serde::{Deserialize, Serialize};

// ============================================================================
// AnalysisConfig
// ============================================================================

/// Tunable options for a single analysis run.
///
/// Every option has a production default; construct with
/// `AnalysisConfig::default()` and override fields as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Capacity of the LRU type cache.
    pub cache_capacity: usize,
    /// Upper bound on fixed-point propagation passes.
    pub max_fixed_point_iterations: u32,
    /// Collect bounded per-reason failure samples for diagnostics.
    pub debug_failure_stats: bool,
    /// Maximum depth for `self.a.b.c.method()` attribute chains.
    pub attribute_chain_max_depth: usize,
    /// Confidence decay applied when substituting a propagated return type.
    pub confidence_propagation_factor: f32,
    /// Fluent-interface factor when the method hints at fluency
    /// (`return self` / `call:` return placeholder).
    pub fluent_with_hint_factor: f32,
    /// Fluent-interface factor when the method exists but records no
    /// return type.
    pub fluent_no_return_factor: f32,
    /// Fluent-interface factor for the pure heuristic fallback.
    pub fluent_heuristic_factor: f32,
    /// Override for the project root component used to normalize
    /// project-internal imports. Detected from the module registry when
    /// unset.
    pub project_root_override: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            cache_capacity: 10_000,
            max_fixed_point_iterations: 4,
            debug_failure_stats: false,
            attribute_chain_max_depth: 4,
            confidence_propagation_factor: 0.95,
            fluent_with_hint_factor: 0.9,
            fluent_no_return_factor: 0.85,
            fluent_heuristic_factor: 0.8,
            project_root_override: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.max_fixed_point_iterations, 4);
        assert!(!config.debug_failure_stats);
        assert_eq!(config.attribute_chain_max_depth, 4);
        assert!((config.confidence_propagation_factor - 0.95).abs() < f32::EPSILON);
        assert!(config.project_root_override.is_none());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"cache_capacity": 64, "debug_failure_stats": true}"#).unwrap();
        assert_eq!(config.cache_capacity, 64);
        assert!(config.debug_failure_stats);
        assert_eq!(config.max_fixed_point_iterations, 4);
    }
}
