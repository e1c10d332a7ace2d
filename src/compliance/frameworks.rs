//! The four framework evaluators.
//!
//! Each evaluator reduces the finding set plus resolved governance
//! signals to a verdict through nested threshold rules specific to the
//! framework.  All of them are total functions: no error paths, no
//! panics, and unresolvable evidence reads as absent.

use super::{ComplianceStatus, Signals};
use crate::finding::{Finding, Severity};

/// Keywords whose presence in a CRITICAL finding marks a security
/// violation under SOC 2.
const SECURITY_KEYWORDS: [&str; 5] =
    ["unauthorized", "injection", "poisoning", "malicious", "exploit"];

/// Keywords marking an integrity violation under SOC 2.
const INTEGRITY_KEYWORDS: [&str; 4] = ["tamper", "modif", "overwrite", "corrupt"];

/// Keywords marking a confidentiality violation under SOC 2.
const CONFIDENTIALITY_KEYWORDS: [&str; 5] =
    ["leak", "exfiltrat", "credential", "expose", "secret"];

fn any_at(findings: &[Finding], severity: Severity) -> bool {
    findings.iter().any(|f| f.severity == severity)
}

/// Case-insensitive keyword search over a finding's title and description.
fn matches_keywords(finding: &Finding, keywords: &[&str]) -> bool {
    let text = format!("{} {}", finding.title, finding.description).to_lowercase();
    keywords.iter().any(|kw| text.contains(kw))
}

/// NIST AI Risk Management Framework.
///
/// The "map" function is considered satisfied by the audit itself (the
/// risk surface has been mapped once a scan ran), so the govern function
/// is the only signal that can fail the framework outright.
#[must_use]
pub fn nist_ai_rmf(findings: &[Finding], signals: &Signals) -> ComplianceStatus {
    if any_at(findings, Severity::Critical) {
        return ComplianceStatus::Fail;
    }
    if !signals.governance {
        return ComplianceStatus::Fail;
    }
    if any_at(findings, Severity::High) || !signals.measurement || !signals.management {
        return ComplianceStatus::Partial;
    }
    ComplianceStatus::Pass
}

/// ISO/IEC 42001 – AI management systems.
#[must_use]
pub fn iso_42001(findings: &[Finding], signals: &Signals) -> ComplianceStatus {
    if any_at(findings, Severity::Critical) {
        return ComplianceStatus::Fail;
    }
    let passed = [
        signals.risk_management,
        signals.data_governance,
        signals.transparency,
        signals.monitoring,
        signals.incident_management,
    ]
    .iter()
    .filter(|&&s| s)
    .count();
    if any_at(findings, Severity::High) || passed < 3 {
        return ComplianceStatus::Fail;
    }
    if any_at(findings, Severity::Medium) || passed < 5 {
        return ComplianceStatus::Partial;
    }
    ComplianceStatus::Pass
}

/// SOC 2 trust criteria applied to AI workloads.
#[must_use]
pub fn soc2_ai(findings: &[Finding], signals: &Signals) -> ComplianceStatus {
    let security_violation = findings.iter().any(|f| {
        f.severity == Severity::Critical && matches_keywords(f, &SECURITY_KEYWORDS)
    });
    if any_at(findings, Severity::Critical) || security_violation {
        return ComplianceStatus::Fail;
    }
    let integrity_violation = findings.iter().any(|f| matches_keywords(f, &INTEGRITY_KEYWORDS));
    let confidentiality_violation =
        findings.iter().any(|f| matches_keywords(f, &CONFIDENTIALITY_KEYWORDS));
    if any_at(findings, Severity::High)
        || integrity_violation
        || confidentiality_violation
        || !signals.security_controls
        || !signals.access_controls
    {
        return ComplianceStatus::Partial;
    }
    if !signals.audit_logging {
        return ComplianceStatus::Partial;
    }
    ComplianceStatus::Pass
}

/// EU AI Act obligations for high-risk systems.
#[must_use]
pub fn eu_ai_act_high_risk(findings: &[Finding], signals: &Signals) -> ComplianceStatus {
    let cybersecurity_failed =
        any_at(findings, Severity::Critical) || !signals.cybersecurity_controls;
    if any_at(findings, Severity::Critical) || cybersecurity_failed {
        return ComplianceStatus::Fail;
    }
    let passed = [
        signals.risk_management,
        signals.data_governance,
        signals.documentation,
        signals.record_keeping,
        signals.transparency,
        signals.human_oversight,
    ]
    .iter()
    .filter(|&&s| s)
    .count();
    if any_at(findings, Severity::High) || passed < 4 {
        return ComplianceStatus::Fail;
    }
    if passed < 6 {
        return ComplianceStatus::Partial;
    }
    ComplianceStatus::Pass
}

// ── Tests ──────────────────────────────────────────────────────────────
