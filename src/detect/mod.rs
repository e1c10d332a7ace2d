//! The detector contract and the registry that composes detectors.
//!
//! A [`Detector`] is a polymorphic unit of analysis: it receives a shared
//! reference to the [`Session`] and returns zero or more [`Finding`]s.
//! Detectors are pure with respect to the session – no I/O, no shared
//! mutable state – so the [`DetectorRegistry`] runs them concurrently and
//! isolates each one's failures: an `Err` or a panic from a single
//! detector is logged and contributes nothing, and the audit continues.

pub mod memory;
pub mod patterns;
pub mod tools;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::join_all;
use thiserror::Error;

use crate::config::AuditConfig;
use crate::finding::{Category, EVIDENCE_LIMIT, Finding, cap_evidence};
use crate::session::Session;

// ── DetectorError ──────────────────────────────────────────────────────

/// An error raised while constructing or running a detector.
///
/// Runtime detection over malformed session records never errors – absent
/// or oddly-shaped fields are treated as empty.  Errors surface from
/// pattern compilation at construction time, or from genuine internal bugs.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A pattern in a static table failed to compile.
    #[error("invalid pattern in detector '{detector}': {reason}")]
    InvalidPattern {
        /// Detector identifier.
        detector: String,
        /// What failed to compile.
        reason: String,
    },

    /// Catch-all for unexpected failures.
    #[error("internal error in detector '{detector}': {source}")]
    Internal {
        /// Detector identifier.
        detector: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// ── Detector trait ─────────────────────────────────────────────────────

/// A single rule unit that scans a [`Session`] and emits [`Finding`]s.
///
/// # Contract
///
/// - [`detect`](Self::detect) must be pure with respect to `self` and the
///   session – no internal mutation between calls, no I/O.
/// - Malformed input is never an error: absence of matches yields an empty
///   result.
/// - Implementations should be cheap to share (`Arc`-wrapped by the
///   registry) and safe across Tokio tasks.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Unique identifier (e.g. `"recursive_instructions"`).
    ///
    /// Used for logging and for disabling via
    /// [`AuditConfig::disabled_detectors`].
    fn name(&self) -> &str;

    /// The category every finding from this detector carries.
    fn category(&self) -> Category;

    /// Scan the session.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] only for internal failures; the registry
    /// recovers these per detector.
    async fn detect(&self, session: &Session) -> Result<Vec<Finding>, DetectorError>;
}

// ── DetectorRegistry ───────────────────────────────────────────────────

/// An ordered collection of detectors with per-detector failure isolation.
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
    evidence_limit: usize,
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.names())
            .field("evidence_limit", &self.evidence_limit)
            .finish()
    }
}

impl DetectorRegistry {
    /// Create an empty registry with the default evidence cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            evidence_limit: EVIDENCE_LIMIT,
        }
    }

    /// Cap evidence strings in collected findings at `limit` characters.
    #[must_use]
    pub fn evidence_limit(mut self, limit: usize) -> Self {
        self.evidence_limit = limit;
        self
    }

    /// Create a registry holding the nine built-in detectors, honoring the
    /// thresholds and disabled-detector list in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidPattern`] if any built-in pattern
    /// table fails to compile.
    pub fn with_defaults(config: &AuditConfig) -> Result<Self, DetectorError> {
        let mut registry = Self::new().evidence_limit(config.evidence_limit);

        registry.register(Arc::new(memory::recursive::RecursiveInstructionDetector::new()?));
        registry.register(Arc::new(memory::persistence::PersistentOverrideDetector::new()?));
        registry.register(Arc::new(memory::encoded::EncodedInjectionDetector::new()?));
        registry.register(Arc::new(memory::signatures::SignatureDetector::new()?));
        registry.register(Arc::new(memory::entropy::EntropyDetector::new(
            config.entropy.clone(),
        )));
        registry.register(Arc::new(memory::drift::GoalDriftDetector::new(
            config.drift.clone(),
        )?));
        registry.register(Arc::new(tools::permissions::BroadPermissionDetector::new()?));
        registry.register(Arc::new(tools::runtime::RuntimeAdditionDetector::new()?));
        registry.register(Arc::new(tools::parameters::SuspiciousParameterDetector::new()?));

        if !config.disabled_detectors.is_empty() {
            registry
                .detectors
                .retain(|d| !config.disabled_detectors.iter().any(|n| n == d.name()));
        }

        Ok(registry)
    }

    /// Add a detector to the end of the sequence.
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// Number of registered detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// True when no detectors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Names of all registered detectors, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector concurrently against the session and collect all
    /// findings.
    ///
    /// A detector that returns `Err` or panics is logged via `tracing` and
    /// contributes zero findings; the remaining detectors are unaffected.
    /// Evidence strings in the collected findings are capped at the
    /// registry's configured limit.
    pub async fn run_all(&self, session: &Session) -> Vec<Finding> {
        let scans = self.detectors.iter().map(|detector| async move {
            let outcome = AssertUnwindSafe(detector.detect(session))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(findings)) => {
                    tracing::debug!(
                        detector = detector.name(),
                        count = findings.len(),
                        "detector completed",
                    );
                    findings
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        detector = detector.name(),
                        error = %err,
                        "detector failed – continuing with zero findings",
                    );
                    Vec::new()
                }
                Err(_) => {
                    tracing::warn!(
                        detector = detector.name(),
                        "detector panicked – continuing with zero findings",
                    );
                    Vec::new()
                }
            }
        });

        let mut findings: Vec<Finding> =
            join_all(scans).await.into_iter().flatten().collect();
        for finding in &mut findings {
            cap_evidence(finding, self.evidence_limit);
        }
        findings
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    struct OneFinding;

    #[async_trait]
    impl Detector for OneFinding {
        fn name(&self) -> &str {
            "one_finding"
        }
        fn category(&self) -> Category {
            Category::MemoryPoisoning
        }
        async fn detect(&self, _session: &Session) -> Result<Vec<Finding>, DetectorError> {
            Ok(vec![Finding::new(
                self.category(),
                Severity::Low,
                "stub finding",
            )])
        }
    }

    struct Failing;

    #[async_trait]
    impl Detector for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn category(&self) -> Category {
            Category::ToolPoisoning
        }
        async fn detect(&self, _session: &Session) -> Result<Vec<Finding>, DetectorError> {
            Err(DetectorError::Internal {
                detector: "failing".into(),
                source: "boom".into(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl Detector for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn category(&self) -> Category {
            Category::ToolPoisoning
        }
        async fn detect(&self, _session: &Session) -> Result<Vec<Finding>, DetectorError> {
            panic!("unexpected");
        }
    }

    #[tokio::test]
    async fn registry_collects_findings() {
        let mut registry = DetectorRegistry::new();
        registry.register(Arc::new(OneFinding));
        registry.register(Arc::new(OneFinding));

        let findings = registry.run_all(&Session::default()).await;
        assert_eq!(findings.len(), 2);
    }

    #[tokio::test]
    async fn failing_detector_is_isolated() {
        let mut registry = DetectorRegistry::new();
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(OneFinding));

        let findings = registry.run_all(&Session::default()).await;
        assert_eq!(findings.len(), 1);
    }

    #[tokio::test]
    async fn panicking_detector_is_isolated() {
        let mut registry = DetectorRegistry::new();
        registry.register(Arc::new(Panicking));
        registry.register(Arc::new(OneFinding));

        let findings = registry.run_all(&Session::default()).await;
        assert_eq!(findings.len(), 1);
    }

    #[tokio::test]
    async fn empty_registry_yields_no_findings() {
        let registry = DetectorRegistry::new();
        assert!(registry.is_empty());
        let findings = registry.run_all(&Session::default()).await;
        assert!(findings.is_empty());
    }

    struct OversizedEvidence;

    #[async_trait]
    impl Detector for OversizedEvidence {
        fn name(&self) -> &str {
            "oversized_evidence"
        }
        fn category(&self) -> Category {
            Category::MemoryPoisoning
        }
        async fn detect(&self, _session: &Session) -> Result<Vec<Finding>, DetectorError> {
            Ok(vec![
                Finding::new(self.category(), Severity::Low, "stub finding")
                    .with_evidence(serde_json::json!({"snippet": "a".repeat(2_000)})),
            ])
        }
    }

    #[tokio::test]
    async fn evidence_cap_applies_to_collected_findings() {
        let mut registry = DetectorRegistry::new().evidence_limit(16);
        registry.register(Arc::new(OversizedEvidence));

        let findings = registry.run_all(&Session::default()).await;
        let snippet = findings[0].evidence.as_ref().unwrap()["snippet"]
            .as_str()
            .unwrap();
        assert_eq!(snippet.len(), 16);
    }

    #[test]
    fn with_defaults_registers_nine() {
        let registry = DetectorRegistry::with_defaults(&AuditConfig::default()).unwrap();
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn disabled_detectors_are_filtered() {
        let config = AuditConfig::new()
            .disabled_detectors(vec!["entropy_anomaly".into(), "goal_drift".into()]);
        let registry = DetectorRegistry::with_defaults(&config).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(!registry.names().contains(&"entropy_anomaly"));
    }
}
