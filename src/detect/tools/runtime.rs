//! Detection of tools added during the session.
//!
//! A tool that appears after the session starts is a classic poisoning
//! vector: the agent trusts it as much as the vetted initial set.  The
//! initial set is taken from `metadata.initialTools` when the capture
//! provides it; otherwise tool timestamps are compared and everything
//! within one minute of the earliest is treated as initial.  Two related
//! checks ride along: tool definitions that generate or evaluate code,
//! and tools carrying no authorization marker at all.

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Value, json};

use super::tool_name;
use crate::detect::patterns::{CompiledTable, codegen_patterns};
use crate::detect::{Detector, DetectorError};
use crate::finding::{Category, Finding, Severity, snippet};
use crate::session::Session;

/// Tools stamped within this window of the earliest timestamp are initial.
const INITIAL_WINDOW_MS: i64 = 60_000;

/// Fields checked, in order, for a tool's creation time.
const TIMESTAMP_KEYS: [&str; 4] = ["timestamp", "created", "addedAt", "created_at"];

/// Marker fields whose presence counts as authorization evidence.
const AUTHORIZATION_KEYS: [&str; 5] =
    ["approved", "authorized", "validated", "verified", "authorization"];

/// Flags runtime tool additions, code-generating tools, and tools with no
/// authorization trail.
pub struct RuntimeAdditionDetector {
    codegen: CompiledTable,
}

impl RuntimeAdditionDetector {
    /// Detector identifier.
    pub const NAME: &'static str = "runtime_additions";

    /// Compile the code-generation indicator table.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidPattern`] if the table fails to
    /// compile.
    pub fn new() -> Result<Self, DetectorError> {
        Ok(Self {
            codegen: CompiledTable::compile(Self::NAME, codegen_patterns())?,
        })
    }
}

/// Resolve a tool's creation time in epoch milliseconds, if any of the
/// known fields parses as a numeric timestamp or an RFC 3339 datetime.
fn tool_timestamp_ms(tool: &Value) -> Option<i64> {
    for key in TIMESTAMP_KEYS {
        match tool.get(key) {
            Some(Value::Number(n)) => {
                if let Some(ms) = n.as_i64() {
                    return Some(ms);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                    return Some(parsed.timestamp_millis());
                }
            }
            _ => {}
        }
    }
    None
}

/// True when the tool carries any authorization evidence.
fn is_authorized(tool: &Value) -> bool {
    AUTHORIZATION_KEYS.iter().any(|key| tool.get(key).is_some())
        || tool
            .get("metadata")
            .and_then(|m| m.get("approved"))
            .is_some()
}

/// Indices of tools that were *not* part of the initial set.
fn runtime_indices(session: &Session) -> Vec<usize> {
    if let Some(initial) = session
        .metadata_value("initialTools")
        .and_then(Value::as_array)
    {
        // The capture told us the initial set; it is authoritative.
        let initial_names: Vec<&str> =
            initial.iter().filter_map(Value::as_str).collect();
        return session
            .tools
            .iter()
            .enumerate()
            .filter(|(index, tool)| {
                let name = tool_name(tool, *index);
                !initial_names.iter().any(|n| *n == name)
            })
            .map(|(index, _)| index)
            .collect();
    }

    let stamped: Vec<(usize, i64)> = session
        .tools
        .iter()
        .enumerate()
        .filter_map(|(index, tool)| tool_timestamp_ms(tool).map(|ms| (index, ms)))
        .collect();
    let Some(earliest) = stamped.iter().map(|(_, ms)| *ms).min() else {
        // No usable timestamps: nothing can be shown to be a late addition.
        return Vec::new();
    };
    stamped
        .into_iter()
        .filter(|(_, ms)| ms.saturating_sub(earliest) > INITIAL_WINDOW_MS)
        .map(|(index, _)| index)
        .collect()
}

#[async_trait]
impl Detector for RuntimeAdditionDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> Category {
        Category::ToolPoisoning
    }

    async fn detect(&self, session: &Session) -> Result<Vec<Finding>, DetectorError> {
        let mut findings = Vec::new();

        for index in runtime_indices(session) {
            let tool = &session.tools[index];
            let name = tool_name(tool, index);
            findings.push(
                Finding::new(
                    Category::ToolPoisoning,
                    Severity::High,
                    format!("Tool '{name}' added at runtime"),
                )
                .with_description(format!(
                    "Tool '{name}' was not part of the session's initial tool set"
                ))
                .with_details(format!("tool index {index}"))
                .with_recommendation(
                    "Require explicit approval before tools join a live session",
                )
                .with_evidence(json!({
                    "tool": name,
                    "index": index,
                })),
            );
        }

        for (index, tool) in session.tools.iter().enumerate() {
            let name = tool_name(tool, index);
            let serialized = tool.to_string();

            for hit in self.codegen.matches(&serialized) {
                findings.push(
                    Finding::new(
                        Category::ToolPoisoning,
                        Severity::Critical,
                        format!("Code generation in tool '{name}'"),
                    )
                    .with_description(format!(
                        "Tool '{name}' generates or evaluates code dynamically"
                    ))
                    .with_details(format!(
                        "indicator {} ({})",
                        hit.pattern.id, hit.pattern.name
                    ))
                    .with_recommendation(
                        "Remove the tool or replace dynamic evaluation with a \
                         fixed command set",
                    )
                    .with_evidence(json!({
                        "tool": name,
                        "index": index,
                        "indicator": hit.pattern.id.as_ref(),
                        "matched": snippet(&hit.matched),
                    })),
                );
            }

            if !is_authorized(tool) {
                findings.push(
                    Finding::new(
                        Category::ToolPoisoning,
                        Severity::Medium,
                        format!("Tool '{name}' has no authorization marker"),
                    )
                    .with_description(format!(
                        "Tool '{name}' carries no approval, validation, or \
                         authorization evidence"
                    ))
                    .with_details(format!("tool index {index}"))
                    .with_recommendation(
                        "Record who approved the tool and when",
                    )
                    .with_evidence(json!({
                        "tool": name,
                        "index": index,
                    })),
                );
            }
        }

        Ok(findings)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
