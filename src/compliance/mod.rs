//! Compliance posture evaluation.
//!
//! Four governance frameworks are each reduced to a PASS/PARTIAL/FAIL
//! verdict from two inputs: the completed finding set and "governance
//! signals" – presence-only checks over `session.metadata` across several
//! synonymous key names.  A signal that cannot be resolved counts as
//! absent, biasing verdicts toward FAIL/PARTIAL rather than silently
//! passing.  Evaluators never fail.

pub mod frameworks;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::finding::Finding;
use crate::session::Session;

// ── ComplianceStatus ───────────────────────────────────────────────────

/// Verdict for one framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplianceStatus {
    /// All framework requirements satisfied.
    Pass,
    /// Gaps found that do not amount to failure.
    Partial,
    /// Framework requirements violated.
    Fail,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

// ── ComplianceReport ───────────────────────────────────────────────────

/// Verdicts for all four frameworks, computed once per audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// NIST AI Risk Management Framework.
    pub nist_ai_rmf: ComplianceStatus,
    /// ISO/IEC 42001 (AI management systems).
    pub iso_42001: ComplianceStatus,
    /// SOC 2 trust criteria applied to AI workloads.
    pub soc2_ai: ComplianceStatus,
    /// EU AI Act obligations for high-risk systems.
    pub eu_ai_act_high_risk: ComplianceStatus,
}

impl ComplianceReport {
    /// Iterate framework name/verdict pairs, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ComplianceStatus)> {
        [
            ("nist_ai_rmf", self.nist_ai_rmf),
            ("iso_42001", self.iso_42001),
            ("soc2_ai", self.soc2_ai),
            ("eu_ai_act_high_risk", self.eu_ai_act_high_risk),
        ]
        .into_iter()
    }
}

// ── Governance signals ─────────────────────────────────────────────────

/// Synonymous metadata keys per governance signal.  Presence of any key
/// (regardless of value) asserts the signal.
mod keys {
    pub const GOVERNANCE: &[&str] = &["governance", "policies", "governancePolicy", "ai_governance"];
    pub const RISK_MANAGEMENT: &[&str] = &["riskManagement", "risk_management", "riskAssessment"];
    pub const MEASUREMENT: &[&str] = &["measurement", "metrics", "evaluations"];
    pub const MANAGEMENT: &[&str] = &["management", "riskTreatment", "mitigations"];
    pub const DATA_GOVERNANCE: &[&str] = &["dataGovernance", "data_governance", "dataQuality"];
    pub const TRANSPARENCY: &[&str] = &["transparency", "transparencyReport", "explainability"];
    pub const MONITORING: &[&str] = &["monitoring", "continuousMonitoring", "continuous_monitoring"];
    pub const INCIDENT_MANAGEMENT: &[&str] =
        &["incidentManagement", "incident_management", "incidentResponse", "incident_response"];
    pub const SECURITY_CONTROLS: &[&str] = &["securityControls", "security_controls", "security"];
    pub const ACCESS_CONTROLS: &[&str] =
        &["accessControls", "access_controls", "accessControl", "access_control"];
    pub const AUDIT_LOGGING: &[&str] = &["auditLogging", "audit_logging", "auditLog", "audit_log"];
    pub const DOCUMENTATION: &[&str] =
        &["documentation", "technicalDocumentation", "technical_documentation"];
    pub const RECORD_KEEPING: &[&str] = &["recordKeeping", "record_keeping", "logging"];
    pub const HUMAN_OVERSIGHT: &[&str] = &["humanOversight", "human_oversight", "oversight"];
    pub const CYBERSECURITY: &[&str] =
        &["cybersecurity", "cybersecurityControls", "cybersecurity_controls"];
}

/// True when any of the synonymous keys is present in the metadata.
fn has_signal(metadata: &Map<String, Value>, synonyms: &[&str]) -> bool {
    synonyms.iter().any(|key| metadata.contains_key(*key))
}

/// Resolved governance signals for one session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    /// A governance policy is on record.
    pub governance: bool,
    /// A risk-management process is on record.
    pub risk_management: bool,
    /// Measurement/metrics evidence exists.
    pub measurement: bool,
    /// Risk-treatment/management evidence exists.
    pub management: bool,
    /// Data-governance evidence exists.
    pub data_governance: bool,
    /// Transparency evidence exists.
    pub transparency: bool,
    /// Continuous monitoring is on record.
    pub monitoring: bool,
    /// Incident-management process is on record.
    pub incident_management: bool,
    /// Security controls are on record.
    pub security_controls: bool,
    /// Access controls are on record.
    pub access_controls: bool,
    /// Audit logging is on record.
    pub audit_logging: bool,
    /// Technical documentation exists.
    pub documentation: bool,
    /// Record keeping is on record.
    pub record_keeping: bool,
    /// Human oversight is on record.
    pub human_oversight: bool,
    /// Cybersecurity controls are on record.
    pub cybersecurity_controls: bool,
}

impl Signals {
    /// Resolve all signals from session metadata.
    #[must_use]
    pub fn resolve(session: &Session) -> Self {
        let m = &session.metadata;
        Self {
            governance: has_signal(m, keys::GOVERNANCE),
            risk_management: has_signal(m, keys::RISK_MANAGEMENT),
            measurement: has_signal(m, keys::MEASUREMENT),
            management: has_signal(m, keys::MANAGEMENT),
            data_governance: has_signal(m, keys::DATA_GOVERNANCE),
            transparency: has_signal(m, keys::TRANSPARENCY),
            monitoring: has_signal(m, keys::MONITORING),
            incident_management: has_signal(m, keys::INCIDENT_MANAGEMENT),
            security_controls: has_signal(m, keys::SECURITY_CONTROLS),
            access_controls: has_signal(m, keys::ACCESS_CONTROLS),
            audit_logging: has_signal(m, keys::AUDIT_LOGGING),
            documentation: has_signal(m, keys::DOCUMENTATION),
            record_keeping: has_signal(m, keys::RECORD_KEEPING),
            human_oversight: has_signal(m, keys::HUMAN_OVERSIGHT),
            cybersecurity_controls: has_signal(m, keys::CYBERSECURITY),
        }
    }
}

/// Evaluate all four frameworks for one audit.
#[must_use]
pub fn evaluate_all(session: &Session, findings: &[Finding]) -> ComplianceReport {
    let signals = Signals::resolve(session);
    ComplianceReport {
        nist_ai_rmf: frameworks::nist_ai_rmf(findings, &signals),
        iso_42001: frameworks::iso_42001(findings, &signals),
        soc2_ai: frameworks::soc2_ai(findings, &signals),
        eu_ai_act_high_risk: frameworks::eu_ai_act_high_risk(findings, &signals),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
