//! Detection of suspicious tool parameters.
//!
//! Parameter definitions are read from a JSON-schema `properties` object
//! or from a flat array.  Three signals per tool: parameter text or
//! declared defaults matching the suspicious-parameter table, string
//! parameters documented as accepting unbounded input, and tool
//! definitions whose own text says they accept arbitrary code.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::tool_name;
use crate::detect::patterns::{CompiledTable, code_acceptance_patterns, parameter_rules};
use crate::detect::{Detector, DetectorError};
use crate::finding::{Category, Finding, Severity, snippet};
use crate::session::Session;
use crate::session::content::field_str;

/// One parameter extracted from a tool definition.
struct Param {
    name: String,
    description: String,
    param_type: String,
    default: Option<Value>,
}

impl Param {
    /// The text surface tested against the suspicious-parameter table.
    fn surface(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.param_type)
    }
}

/// Flags parameters whose shape invites injection or abuse.
pub struct SuspiciousParameterDetector {
    rules: CompiledTable,
    code_acceptance: CompiledTable,
}

impl SuspiciousParameterDetector {
    /// Detector identifier.
    pub const NAME: &'static str = "suspicious_parameters";

    /// Compile the parameter-rule and code-acceptance tables.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidPattern`] if either table fails to
    /// compile.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            rules: CompiledTable::compile(Self::NAME, parameter_rules())?,
            code_acceptance: CompiledTable::compile(Self::NAME, code_acceptance_patterns())?,
        })
    }
}

/// Extract parameter definitions, tolerating both schema and array shapes.
fn collect_params(tool: &Value) -> Vec<Param> {
    let Some(parameters) = tool.get("parameters") else {
        return Vec::new();
    };

    let mut params = Vec::new();
    if let Some(properties) = parameters.get("properties").and_then(Value::as_object) {
        for (name, schema) in properties {
            params.push(Param {
                name: name.clone(),
                description: field_str(schema, "description").unwrap_or_default().to_owned(),
                param_type: field_str(schema, "type").unwrap_or_default().to_owned(),
                default: schema.get("default").cloned(),
            });
        }
    } else if let Some(items) = parameters.as_array() {
        for item in items {
            match item {
                Value::String(name) => params.push(Param {
                    name: name.clone(),
                    description: String::new(),
                    param_type: String::new(),
                    default: None,
                }),
                Value::Object(_) => params.push(Param {
                    name: field_str(item, "name").unwrap_or_default().to_owned(),
                    description: field_str(item, "description").unwrap_or_default().to_owned(),
                    param_type: field_str(item, "type").unwrap_or_default().to_owned(),
                    default: item.get("default").cloned(),
                }),
                _ => {}
            }
        }
    }
    params
}

/// A string parameter documented as taking anything, with no mention of
/// validation or bounds.
fn is_unbounded_string(param: &Param) -> bool {
    if param.param_type != "string" {
        return false;
    }
    let description = param.description.to_lowercase();
    let open = ["any", "arbitrary", "free form", "free-form"]
        .iter()
        .any(|kw| description.contains(kw));
    let bounded = ["validated", "limited", "max"]
        .iter()
        .any(|kw| description.contains(kw));
    open && !bounded
}

#[async_trait]
impl Detector for SuspiciousParameterDetector {
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

            for param in collect_params(tool) {
                for hit in self.rules.matches(&param.surface()) {
                    findings.push(
                        Finding::new(
                            Category::ToolPoisoning,
                            hit.pattern.severity,
                            format!("Suspicious parameter '{}' on '{name}'", param.name),
                        )
                        .with_description(format!(
                            "Parameter '{}' of tool '{name}' shows {}",
                            param.name, hit.pattern.name
                        ))
                        .with_details(format!("rule {} matched parameter text", hit.pattern.id))
                        .with_recommendation(
                            "Constrain the parameter with an explicit allowlist or schema",
                        )
                        .with_evidence(json!({
                            "tool": name,
                            "parameter": param.name,
                            "rule": hit.pattern.id.as_ref(),
                            "matched": hit.matched,
                        })),
                    );
                }

                if let Some(default) = &param.default {
                    let rendered = match default.as_str() {
                        Some(s) => s.to_owned(),
                        None => default.to_string(),
                    };
                    for hit in self.rules.matches(&rendered) {
                        findings.push(
                            Finding::new(
                                Category::ToolPoisoning,
                                hit.pattern.severity,
                                format!(
                                    "Suspicious default for '{}' on '{name}'",
                                    param.name
                                ),
                            )
                            .with_description(format!(
                                "Default value of parameter '{}' shows {}",
                                param.name, hit.pattern.name
                            ))
                            .with_details(format!(
                                "rule {} matched default value",
                                hit.pattern.id
                            ))
                            .with_recommendation("Replace the default with an inert value")
                            .with_evidence(json!({
                                "tool": name,
                                "parameter": param.name,
                                "rule": hit.pattern.id.as_ref(),
                                "default": snippet(&rendered),
                            })),
                        );
                    }
                }

                if is_unbounded_string(&param) {
                    findings.push(
                        Finding::new(
                            Category::ToolPoisoning,
                            Severity::Medium,
                            format!("Unbounded string parameter '{}' on '{name}'", param.name),
                        )
                        .with_description(format!(
                            "Parameter '{}' accepts free-form text with no stated \
                             validation or length bound",
                            param.name
                        ))
                        .with_details(format!("parameter of tool index {index}"))
                        .with_recommendation("Document and enforce a validation rule")
                        .with_evidence(json!({
                            "tool": name,
                            "parameter": param.name,
                        })),
                    );
                }
            }

            let serialized = tool.to_string();
            let acceptance = self.code_acceptance.matches(&serialized);
            if let Some(hit) = acceptance.first() {
                findings.push(
                    Finding::new(
                        Category::ToolPoisoning,
                        Severity::Critical,
                        format!("Tool '{name}' accepts arbitrary code"),
                    )
                    .with_description(format!(
                        "Tool '{name}' is documented as running caller-supplied code"
                    ))
                    .with_details(format!(
                        "phrase {} ({})",
                        hit.pattern.id, hit.pattern.name
                    ))
                    .with_recommendation(
                        "Remove the tool or gate execution behind review",
                    )
                    .with_evidence(json!({
                        "tool": name,
                        "index": index,
                        "phrase": hit.pattern.id.as_ref(),
                        "matched": hit.matched,
                    })),
                );
            }
        }

        Ok(findings)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
