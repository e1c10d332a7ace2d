//! Finding types – the atomic unit of audit output.
//!
//! Every detector emits zero or more [`Finding`]s.  A finding carries a
//! [`Category`], a [`Severity`], human-readable text fields, and an optional
//! free-form evidence payload.  Findings are created once and never mutated;
//! the pipeline collects them into a single list for scoring, compliance
//! evaluation, and reporting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length (in characters) of any evidence snippet.
///
/// Bounds report size and avoids leaking excessive raw session content
/// into downstream renderers.
pub const EVIDENCE_LIMIT: usize = 500;

// ── Severity ───────────────────────────────────────────────────────────

/// Severity level for a finding.
///
/// Ordered from lowest to highest – `Ord` is derived so that comparisons
/// like `severity >= Severity::High` work naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Low risk – may warrant logging.
    Low,
    /// Medium risk – warrants investigation.
    Medium,
    /// High risk – should block in most policies.
    High,
    /// Critical – immediate containment and incident trigger.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ── Category ───────────────────────────────────────────────────────────

/// High-level classification of what a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Category {
    /// Indicators of poisoned or manipulated agent memory/conversation.
    MemoryPoisoning,
    /// Indicators of dangerous, unauthorized, or manipulated tools.
    ToolPoisoning,
    /// Observations produced by compliance evaluation.
    Compliance,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryPoisoning => write!(f, "memory_poisoning"),
            Self::ToolPoisoning => write!(f, "tool_poisoning"),
            Self::Compliance => write!(f, "compliance"),
        }
    }
}

// ── Finding ────────────────────────────────────────────────────────────

/// One reported security observation.
///
/// Constructed by detectors via [`Finding::new`] plus the `with_*` builder
/// setters, then owned by the finding list for the rest of the pipeline.
///
/// ```rust
/// use palisade::finding::{Category, Finding, Severity};
///
/// let f = Finding::new(Category::MemoryPoisoning, Severity::Critical, "Instruction override")
///     .with_description("Memory entry attempts to cancel prior instructions")
///     .with_recommendation("Purge the offending memory entry");
/// assert_eq!(f.severity, Severity::Critical);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique identifier, generated at construction.
    pub id: String,
    /// Which detector family produced this finding.
    pub category: Category,
    /// Canonical severity level.
    pub severity: Severity,
    /// Short human-readable title.
    pub title: String,
    /// What was observed.
    #[serde(default)]
    pub description: String,
    /// Where/how it was observed (indices, pattern names, counts).
    #[serde(default)]
    pub details: String,
    /// Suggested next step for this specific finding.
    #[serde(default)]
    pub recommendation: String,
    /// Free-form diagnostic payload (matched pattern, decoded content,
    /// truncated snippet).  Snippets inside must respect [`EVIDENCE_LIMIT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

impl Finding {
    /// Create a finding with a fresh id and empty text fields.
    #[must_use]
    pub fn new(category: Category, severity: Severity, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category,
            severity,
            title: title.into(),
            description: String::new(),
            details: String::new(),
            recommendation: String::new(),
            evidence: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Set the per-finding recommendation.
    #[must_use]
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    /// Attach an evidence payload.
    #[must_use]
    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Truncate `text` to [`EVIDENCE_LIMIT`] characters for evidence payloads.
///
/// Character-based (not byte-based) so multi-byte content never splits.
#[must_use]
pub fn snippet(text: &str) -> String {
    snippet_with_limit(text, EVIDENCE_LIMIT)
}

/// Truncate `text` to at most `limit` characters.
#[must_use]
pub fn snippet_with_limit(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Enforce an evidence cap over a finding's payload in place.
///
/// Every string leaf in the evidence JSON is truncated to `limit`
/// characters.  Applied by the registry after detection, so a tightened
/// [`AuditConfig::evidence_limit`](crate::config::AuditConfig) holds no
/// matter what a detector emitted.
pub fn cap_evidence(finding: &mut Finding, limit: usize) {
    if let Some(evidence) = &mut finding.evidence {
        cap_strings(evidence, limit);
    }
}

fn cap_strings(value: &mut serde_json::Value, limit: usize) {
    match value {
        serde_json::Value::String(s) => {
            if s.chars().count() > limit {
                *s = snippet_with_limit(s, limit);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                cap_strings(item, limit);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                cap_strings(item, limit);
            }
        }
        _ => {}
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
