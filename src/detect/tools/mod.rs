//! Tool-poisoning detectors.
//!
//! Three detectors examine the tool definitions available to the agent:
//! what each tool is allowed to do, when it appeared in the session, and
//! what its parameters accept.  All of them emit findings in
//! [`Category::ToolPoisoning`](crate::finding::Category::ToolPoisoning).

pub mod parameters;
pub mod permissions;
pub mod runtime;

use serde_json::Value;

use crate::session::content::field_str;

/// Best-effort display name for a tool record.
#[must_use]
pub(crate) fn tool_name(tool: &Value, index: usize) -> String {
    field_str(tool, "name")
        .or_else(|| field_str(tool, "id"))
        .map_or_else(|| format!("tool #{index}"), str::to_owned)
}
