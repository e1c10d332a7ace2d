//! The session model – the immutable input to one audit.
//!
//! A [`Session`] captures one agent interaction: ordered conversation
//! messages, an ordered memory log, the set of tool definitions the agent
//! could invoke, and source-supplied metadata.  Upstream sources (various
//! MCP servers, replay files, capture proxies) disagree on field names and
//! shapes, so records are kept as raw [`serde_json::Value`]s and resolved
//! through the helpers in [`content`].
//!
//! The session is owned by the caller and passed by shared reference into
//! every detector and evaluator; nothing in the pipeline mutates it.

pub mod content;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ── Session ────────────────────────────────────────────────────────────

/// The captured state of one agent interaction being audited.
///
/// ```rust
/// use palisade::session::Session;
///
/// let session = Session::builder()
///     .system_message("You are a cooking assistant.")
///     .user_message("How do I poach an egg?")
///     .memory_entry("User prefers metric units")
///     .build();
///
/// assert_eq!(session.messages.len(), 2);
/// assert_eq!(session.memory.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Conversation history, in order.  Heterogeneous records.
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Persistent memory log, in order.  Heterogeneous records.
    #[serde(default)]
    pub memory: Vec<Value>,
    /// Tool definitions available to the agent.  Loosely typed.
    #[serde(default)]
    pub tools: Vec<Value>,
    /// Source-supplied metadata, including optional governance signals.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Session {
    /// Start building a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Look up a metadata value by key.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// True when the session carries no messages, memory, or tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.memory.is_empty() && self.tools.is_empty()
    }
}

// ── SessionBuilder ─────────────────────────────────────────────────────

/// Builder for [`Session`] with typed convenience constructors.
///
/// Raw [`Value`] records can be mixed freely with the typed helpers, which
/// matters for tests that exercise the heterogeneous upstream shapes.
#[derive(Debug, Default)]
pub struct SessionBuilder {
    messages: Vec<Value>,
    memory: Vec<Value>,
    tools: Vec<Value>,
    metadata: Map<String, Value>,
}

impl SessionBuilder {
    /// Append a raw message record.
    #[must_use]
    pub fn message(mut self, record: Value) -> Self {
        self.messages.push(record);
        self
    }

    /// Append a `{role: "system", content}` message.
    #[must_use]
    pub fn system_message(self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.message(json!({"role": "system", "content": content}))
    }

    /// Append a `{role: "user", content}` message.
    #[must_use]
    pub fn user_message(self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.message(json!({"role": "user", "content": content}))
    }

    /// Append a `{role: "assistant", content}` message.
    #[must_use]
    pub fn assistant_message(self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.message(json!({"role": "assistant", "content": content}))
    }

    /// Append a raw memory record.
    #[must_use]
    pub fn memory(mut self, record: Value) -> Self {
        self.memory.push(record);
        self
    }

    /// Append a plain-string memory entry.
    #[must_use]
    pub fn memory_entry(self, content: impl Into<String>) -> Self {
        self.memory(Value::String(content.into()))
    }

    /// Append a raw tool definition.
    #[must_use]
    pub fn tool(mut self, record: Value) -> Self {
        self.tools.push(record);
        self
    }

    /// Set a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Build the session.
    #[must_use]
    pub fn build(self) -> Session {
        Session {
            messages: self.messages,
            memory: self.memory,
            tools: self.tools,
            metadata: self.metadata,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
