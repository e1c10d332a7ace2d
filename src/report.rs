//! The audit report – the single output value of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compliance::ComplianceReport;
use crate::finding::Finding;
use crate::risk::{RiskLevel, SeverityCounts, risk_score};

/// The complete result of auditing one session.
///
/// Constructed once by the pipeline and never mutated; serializable so
/// external renderers (JSON, HTML, console) can consume it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Unique report identifier.
    pub id: String,
    /// When the audit completed.
    pub timestamp: DateTime<Utc>,
    /// Severity-weighted risk score, 0–100.
    pub risk_score: u8,
    /// Discrete level derived from the score.
    pub risk_level: RiskLevel,
    /// Every finding produced by the detectors.
    pub findings: Vec<Finding>,
    /// Verdicts for the four governance frameworks.
    pub compliance: ComplianceReport,
    /// Prioritized next steps.
    pub recommendations: Vec<String>,
}

impl AuditReport {
    /// Assemble a report from the pipeline's intermediate products.
    ///
    /// The score and level are computed here so they can never disagree
    /// with the finding list they ship alongside.
    #[must_use]
    pub fn assemble(
        findings: Vec<Finding>,
        compliance: ComplianceReport,
        recommendations: Vec<String>,
    ) -> Self {
        let counts = SeverityCounts::tally(&findings);
        let score = risk_score(&counts);
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            risk_score: score,
            risk_level: RiskLevel::from_score(score),
            findings,
            compliance,
            recommendations,
        }
    }

    /// Severity tallies over this report's findings.
    #[must_use]
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::tally(&self.findings)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::ComplianceStatus;
    use crate::finding::{Category, Severity};

    fn all_pass() -> ComplianceReport {
        ComplianceReport {
            nist_ai_rmf: ComplianceStatus::Pass,
            iso_42001: ComplianceStatus::Pass,
            soc2_ai: ComplianceStatus::Pass,
            eu_ai_act_high_risk: ComplianceStatus::Pass,
        }
    }

    #[test]
    fn score_and_level_agree_with_findings() {
        let findings = vec![Finding::new(
            Category::MemoryPoisoning,
            Severity::Critical,
            "t",
        )];
        let report = AuditReport::assemble(findings, all_pass(), Vec::new());
        assert_eq!(report.risk_score, 20);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn severity_counts_tally_the_finding_list() {
        let findings = vec![
            Finding::new(Category::MemoryPoisoning, Severity::Critical, "a"),
            Finding::new(Category::ToolPoisoning, Severity::High, "b"),
            Finding::new(Category::ToolPoisoning, Severity::High, "c"),
            Finding::new(Category::Compliance, Severity::Low, "d"),
        ];
        let report = AuditReport::assemble(findings, all_pass(), Vec::new());
        let counts = report.severity_counts();
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.medium, 0);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn empty_findings_score_zero() {
        let report = AuditReport::assemble(Vec::new(), all_pass(), Vec::new());
        assert_eq!(report.risk_score, 0);
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn report_round_trips_json() {
        let report = AuditReport::assemble(Vec::new(), all_pass(), vec!["ok".into()]);
        let text = serde_json::to_string(&report).unwrap();
        let restored: AuditReport = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.id, report.id);
        assert_eq!(restored.risk_score, 0);
        assert_eq!(restored.recommendations, vec!["ok".to_owned()]);
    }
}
