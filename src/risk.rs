//! Severity-weighted risk aggregation.
//!
//! Findings are tallied by severity, combined into a weighted sum, and
//! mapped through a saturating exponential onto a 0–100 score.  The curve
//! keeps a single critical finding clearly visible (score 20) while
//! guaranteeing the score never escapes the scale no matter how many
//! findings pile up.

use serde::{Deserialize, Serialize};

use crate::finding::{Finding, Severity};

/// Weight of one CRITICAL finding.
const WEIGHT_CRITICAL: f64 = 40.0;
/// Weight of one HIGH finding.
const WEIGHT_HIGH: f64 = 20.0;
/// Weight of one MEDIUM finding.
const WEIGHT_MEDIUM: f64 = 10.0;
/// Weight of one LOW finding.
const WEIGHT_LOW: f64 = 5.0;
/// Saturation constant of the score curve.
const SCALE: f64 = 180.0;

// ── SeverityCounts ─────────────────────────────────────────────────────

/// Finding counts per severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Number of CRITICAL findings.
    pub critical: usize,
    /// Number of HIGH findings.
    pub high: usize,
    /// Number of MEDIUM findings.
    pub medium: usize,
    /// Number of LOW findings.
    pub low: usize,
}

impl SeverityCounts {
    /// Tally a finding list.
    #[must_use]
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    /// The weighted severity sum.
    #[must_use]
    pub fn weighted(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        {
            WEIGHT_CRITICAL * self.critical as f64
                + WEIGHT_HIGH * self.high as f64
                + WEIGHT_MEDIUM * self.medium as f64
                + WEIGHT_LOW * self.low as f64
        }
    }

    /// Total number of findings counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Map severity counts onto the 0–100 risk score.
///
/// `score = round(100 · (1 − e^(−w/180)))` where `w` is the weighted sum.
/// Clamped so the result is in range even under pathological inputs.
#[must_use]
pub fn risk_score(counts: &SeverityCounts) -> u8 {
    let raw = 100.0 * (1.0 - (-counts.weighted() / SCALE).exp());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        raw.round().clamp(0.0, 100.0) as u8
    }
}

// ── RiskLevel ──────────────────────────────────────────────────────────

/// Discrete risk level derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Score below 20.
    Low,
    /// Score in [20, 50).
    Medium,
    /// Score in [50, 80).
    High,
    /// Score 80 and above.
    Critical,
}

impl RiskLevel {
    /// Canonical score-to-level mapping.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=19 => Self::Low,
            20..=49 => Self::Medium,
            50..=79 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts(critical: usize, high: usize, medium: usize, low: usize) -> SeverityCounts {
        SeverityCounts {
            critical,
            high,
            medium,
            low,
        }
    }

    #[test]
    fn reference_scores() {
        assert_eq!(risk_score(&counts(0, 0, 0, 0)), 0);
        assert_eq!(risk_score(&counts(1, 0, 0, 0)), 20);
        assert_eq!(risk_score(&counts(0, 1, 0, 0)), 11);
        assert_eq!(risk_score(&counts(0, 0, 1, 0)), 5);
        assert_eq!(risk_score(&counts(0, 0, 0, 1)), 3);
        assert_eq!(risk_score(&counts(1, 1, 1, 1)), 34);
        assert_eq!(risk_score(&counts(10, 10, 10, 10)), 98);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn tally_counts_each_level() {
        use crate::finding::{Category, Finding};
        let findings = vec![
            Finding::new(Category::MemoryPoisoning, Severity::Critical, "a"),
            Finding::new(Category::MemoryPoisoning, Severity::High, "b"),
            Finding::new(Category::ToolPoisoning, Severity::High, "c"),
            Finding::new(Category::ToolPoisoning, Severity::Low, "d"),
        ];
        let tallied = SeverityCounts::tally(&findings);
        assert_eq!(tallied, counts(1, 2, 0, 1));
        assert_eq!(tallied.total(), 4);
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            critical in 0usize..500,
            high in 0usize..500,
            medium in 0usize..500,
            low in 0usize..500,
        ) {
            let score = risk_score(&counts(critical, high, medium, low));
            prop_assert!(score <= 100);
        }

        #[test]
        fn score_is_monotone_in_each_severity(
            critical in 0usize..50,
            high in 0usize..50,
            medium in 0usize..50,
            low in 0usize..50,
        ) {
            let base = risk_score(&counts(critical, high, medium, low));
            prop_assert!(risk_score(&counts(critical + 1, high, medium, low)) >= base);
            prop_assert!(risk_score(&counts(critical, high + 1, medium, low)) >= base);
            prop_assert!(risk_score(&counts(critical, high, medium + 1, low)) >= base);
            prop_assert!(risk_score(&counts(critical, high, medium, low + 1)) >= base);
        }
    }
}
