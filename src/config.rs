//! Audit-level configuration.
//!
//! One [`AuditConfig`] carries the registry-level knobs plus the tunable
//! thresholds of the statistical detectors.  Builder setters consume and
//! return `self`; serde defaults keep deserialized configs complete when
//! fields are omitted.

use serde::{Deserialize, Serialize};

use crate::detect::memory::drift::DriftConfig;
use crate::detect::memory::entropy::EntropyConfig;
use crate::finding::EVIDENCE_LIMIT;

/// Configuration for one audit pipeline.
///
/// ```rust
/// use palisade::config::AuditConfig;
///
/// let config = AuditConfig::new()
///     .disabled_detectors(vec!["entropy_anomaly".into()]);
/// assert_eq!(config.disabled_detectors.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Detector names excluded from the default registry.
    pub disabled_detectors: Vec<String>,
    /// Maximum characters per evidence string in any finding.
    pub evidence_limit: usize,
    /// Thresholds for the entropy detector.
    pub entropy: EntropyConfig,
    /// Thresholds for the goal-drift detector.
    pub drift: DriftConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            disabled_detectors: Vec::new(),
            evidence_limit: EVIDENCE_LIMIT,
            entropy: EntropyConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude detectors by name.
    #[must_use]
    pub fn disabled_detectors(mut self, names: Vec<String>) -> Self {
        self.disabled_detectors = names;
        self
    }

    /// Cap evidence strings at `limit` characters.
    #[must_use]
    pub fn evidence_limit(mut self, limit: usize) -> Self {
        self.evidence_limit = limit;
        self
    }

    /// Replace the entropy thresholds.
    #[must_use]
    pub fn entropy(mut self, config: EntropyConfig) -> Self {
        self.entropy = config;
        self
    }

    /// Replace the drift thresholds.
    #[must_use]
    pub fn drift(mut self, config: DriftConfig) -> Self {
        self.drift = config;
        self
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_detector_thresholds() {
        let config = AuditConfig::default();
        assert!(config.disabled_detectors.is_empty());
        assert_eq!(config.evidence_limit, 500);
        assert!((config.entropy.high_threshold - 5.5).abs() < f64::EPSILON);
        assert!((config.drift.high_threshold - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn deserializes_from_partial_json() {
        let config: AuditConfig = serde_json::from_str(
            r#"{"disabled_detectors": ["goal_drift"], "entropy": {"high_threshold": 6.0}}"#,
        )
        .unwrap();
        assert_eq!(config.disabled_detectors, vec!["goal_drift".to_owned()]);
        assert!((config.entropy.high_threshold - 6.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults.
        assert_eq!(config.entropy.min_length, 50);
        assert_eq!(config.evidence_limit, 500);
    }

    #[test]
    fn evidence_limit_is_settable() {
        let config = AuditConfig::new().evidence_limit(64);
        assert_eq!(config.evidence_limit, 64);
    }

    #[test]
    fn builders_compose() {
        let config = AuditConfig::new()
            .entropy(EntropyConfig::new().medium_threshold(4.0))
            .drift(DriftConfig::new().medium_threshold(0.5));
        assert!((config.entropy.medium_threshold - 4.0).abs() < f64::EPSILON);
        assert!((config.drift.medium_threshold - 0.5).abs() < f64::EPSILON);
    }
}
