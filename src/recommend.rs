//! Recommendation generation.
//!
//! Reduces the finding set and compliance verdicts to a short list of
//! prioritized, human-readable next steps.  Ordering is deliberate:
//! containment first, category remediation second, framework gaps last.

use crate::compliance::{ComplianceReport, ComplianceStatus};
use crate::finding::{Category, Finding, Severity};

fn framework_label(key: &str) -> &'static str {
    match key {
        "nist_ai_rmf" => "NIST AI RMF",
        "iso_42001" => "ISO/IEC 42001",
        "soc2_ai" => "SOC 2 (AI)",
        "eu_ai_act_high_risk" => "EU AI Act (high-risk)",
        _ => "framework",
    }
}

/// Derive recommendations from an audit's findings and compliance report.
#[must_use]
pub fn generate(findings: &[Finding], compliance: &ComplianceReport) -> Vec<String> {
    let mut recommendations = Vec::new();

    let critical_count = findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    if critical_count > 0 {
        recommendations.push(format!(
            "URGENT: {critical_count} critical finding(s) detected. Isolate the \
             agent session and rotate any credentials it could reach before \
             resuming operation."
        ));
    }

    if findings
        .iter()
        .any(|f| f.category == Category::MemoryPoisoning)
    {
        recommendations.push(
            "Purge or quarantine the flagged memory entries and add validation \
             at the memory write path so injected instructions cannot persist."
                .to_owned(),
        );
    }

    if findings
        .iter()
        .any(|f| f.category == Category::ToolPoisoning)
    {
        recommendations.push(
            "Review the flagged tool definitions, move the tool set to an \
             explicit allowlist, and require approval for any runtime change."
                .to_owned(),
        );
    }

    for (key, status) in compliance.iter() {
        match status {
            ComplianceStatus::Fail => recommendations.push(format!(
                "Remediate {} compliance: the session fails the framework's \
                 requirements; address the findings above and record the \
                 missing governance evidence in session metadata.",
                framework_label(key)
            )),
            ComplianceStatus::Partial => recommendations.push(format!(
                "Harden {} posture: partial compliance indicates gaps in \
                 governance evidence or unresolved medium/high findings.",
                framework_label(key)
            )),
            ComplianceStatus::Pass => {}
        }
    }

    if recommendations.is_empty() {
        recommendations.push(
            "No security issues detected. Record this audit as a baseline and \
             schedule periodic re-audits to catch drift."
                .to_owned(),
        );
    }

    recommendations
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn all_pass() -> ComplianceReport {
        ComplianceReport {
            nist_ai_rmf: ComplianceStatus::Pass,
            iso_42001: ComplianceStatus::Pass,
            soc2_ai: ComplianceStatus::Pass,
            eu_ai_act_high_risk: ComplianceStatus::Pass,
        }
    }

    #[test]
    fn clean_audit_yields_baseline_recommendation() {
        let recommendations = generate(&[], &all_pass());
        assert_eq!(recommendations.len(), 1);
        assert!(recommendations[0].contains("baseline"));
    }

    #[test]
    fn critical_finding_puts_containment_first() {
        let findings = vec![Finding::new(
            Category::MemoryPoisoning,
            Severity::Critical,
            "Instruction override",
        )];
        let recommendations = generate(&findings, &all_pass());
        assert!(recommendations[0].starts_with("URGENT"));
        assert!(recommendations.iter().any(|r| r.contains("memory")));
    }

    #[test]
    fn failed_framework_gets_a_remediation_line() {
        let compliance = ComplianceReport {
            nist_ai_rmf: ComplianceStatus::Fail,
            iso_42001: ComplianceStatus::Partial,
            soc2_ai: ComplianceStatus::Pass,
            eu_ai_act_high_risk: ComplianceStatus::Pass,
        };
        let recommendations = generate(&[], &compliance);
        assert!(recommendations.iter().any(|r| r.contains("NIST AI RMF")));
        assert!(recommendations.iter().any(|r| r.contains("ISO/IEC 42001")));
        assert_eq!(recommendations.len(), 2);
    }

    #[test]
    fn tool_findings_trigger_allowlist_guidance() {
        let findings = vec![Finding::new(
            Category::ToolPoisoning,
            Severity::High,
            "Runtime addition",
        )];
        let recommendations = generate(&findings, &all_pass());
        assert!(recommendations.iter().any(|r| r.contains("allowlist")));
    }
}
