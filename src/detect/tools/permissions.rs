//! Detection of overly broad tool permissions.
//!
//! Permission declarations arrive in several shapes – a single string, an
//! array of strings, or an object whose keys (and string values) name the
//! grants – under any of the keys `permissions`, `capabilities`, or
//! `access`.  Each resolved permission string is tested against the
//! dangerous-permission table; tool descriptions and parameter text get a
//! keyword scan with the same table.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::tool_name;
use crate::detect::patterns::{CompiledTable, permission_rules};
use crate::detect::{Detector, DetectorError};
use crate::finding::{Category, Finding, Severity, snippet};
use crate::session::Session;
use crate::session::content::field_str;

/// More grants than this on one tool is itself a finding.
const EXCESSIVE_PERMISSION_COUNT: usize = 5;

/// Keys under which tools declare their grants.
const PERMISSION_KEYS: [&str; 3] = ["permissions", "capabilities", "access"];

/// Flags dangerous and excessive permission grants on tools.
pub struct BroadPermissionDetector {
    table: CompiledTable,
}

impl BroadPermissionDetector {
    /// Detector identifier.
    pub const NAME: &'static str = "broad_permissions";

    /// Compile the dangerous-permission table.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidPattern`] if the table fails to
    /// compile.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            table: CompiledTable::compile(Self::NAME, permission_rules())?,
        })
    }
}

/// Flatten a tool's permission declarations into plain strings.
fn collect_permissions(tool: &Value) -> Vec<String> {
    let mut permissions = Vec::new();
    for key in PERMISSION_KEYS {
        match tool.get(key) {
            Some(Value::String(s)) => permissions.push(s.clone()),
            Some(Value::Array(items)) => {
                permissions.extend(items.iter().filter_map(Value::as_str).map(str::to_owned));
            }
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    permissions.push(k.clone());
                    if let Some(s) = v.as_str() {
                        permissions.push(s.to_owned());
                    }
                }
            }
            _ => {}
        }
    }
    permissions
}

#[async_trait]
impl Detector for BroadPermissionDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> Category {
        Category::ToolPoisoning
    }

    async fn detect(&self, session: &Session) -> Result<Vec<Finding>, DetectorError> {
        let mut findings = Vec::new();

        for (index, tool) in session.tools.iter().enumerate() {
            let name = tool_name(tool, index);
            let permissions = collect_permissions(tool);

            for permission in &permissions {
                for hit in self.table.matches(permission) {
                    findings.push(
                        Finding::new(
                            Category::ToolPoisoning,
                            hit.pattern.severity,
                            format!("Dangerous permission on '{name}'"),
                        )
                        .with_description(format!(
                            "Tool '{name}' is granted {} access",
                            hit.pattern.name
                        ))
                        .with_details(format!(
                            "rule {} matched permission '{}'",
                            hit.pattern.id,
                            snippet(permission)
                        ))
                        .with_recommendation(
                            "Narrow the grant to the minimum the tool needs",
                        )
                        .with_evidence(json!({
                            "tool": name,
                            "index": index,
                            "rule": hit.pattern.id.as_ref(),
                            "permission": snippet(permission),
                        })),
                    );
                }
            }

            // Keyword scan over the human-facing surface of the tool.
            let mut surface = field_str(tool, "description").unwrap_or_default().to_owned();
            if let Some(params) = tool.get("parameters") {
                surface.push(' ');
                surface.push_str(&params.to_string());
            }
            for hit in self.table.matches(&surface) {
                findings.push(
                    Finding::new(
                        Category::ToolPoisoning,
                        hit.pattern.severity,
                        format!("Dangerous capability described by '{name}'"),
                    )
                    .with_description(format!(
                        "Tool '{name}' describes {} behavior outside its \
                         declared permissions",
                        hit.pattern.name
                    ))
                    .with_details(format!("rule {} matched tool surface text", hit.pattern.id))
                    .with_recommendation(
                        "Align the tool's description and schema with its grants",
                    )
                    .with_evidence(json!({
                        "tool": name,
                        "index": index,
                        "rule": hit.pattern.id.as_ref(),
                        "matched": hit.matched,
                    })),
                );
            }

            if permissions.len() > EXCESSIVE_PERMISSION_COUNT {
                findings.push(
                    Finding::new(
                        Category::ToolPoisoning,
                        Severity::Medium,
                        format!("Excessive permissions on '{name}'"),
                    )
                    .with_description(format!(
                        "Tool '{name}' holds {} separate grants",
                        permissions.len()
                    ))
                    .with_details(format!(
                        "count {} exceeds {EXCESSIVE_PERMISSION_COUNT}",
                        permissions.len()
                    ))
                    .with_recommendation("Split the tool or drop unused grants")
                    .with_evidence(json!({
                        "tool": name,
                        "index": index,
                        "count": permissions.len(),
                    })),
                );
            }
        }

        Ok(findings)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
