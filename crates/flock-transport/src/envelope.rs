use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Message envelope: one JSON object per line on the wire.
///
/// ```json
/// {"src":"c1","dest":"n1","body":{"type":"read","msg_id":7}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Sender's NodeId.
    pub src: NodeId,

    /// Recipient's NodeId.
    pub dest: NodeId,

    /// Typed body, correlated by `msg_id` / `in_reply_to`.
    pub body: Body,
}

/// Envelope body. `kind` selects the handler, everything else the
/// handler needs lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Message type (e.g., "broadcast", "read_ok", "error").
    #[serde(rename = "type")]
    pub kind: String,

    /// Sender-unique id, present on anything that expects a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    /// The `msg_id` of the request this body answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    /// Remaining payload fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Body {
    /// Create a body with no payload fields.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            msg_id: None,
            in_reply_to: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Add a payload field.
    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Build an error body using the cluster-test error code convention.
    pub fn error(code: u32, text: &str) -> Self {
        Self::new(ERROR_KIND)
            .with("code", code.into())
            .with("text", text.into())
    }

    /// Decode a body from a JSON object carrying a `type` member.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode as a flat JSON object (`type`, ids and fields side by side).
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// `(code, text)` if this is an error body.
    pub fn as_error(&self) -> Option<(u32, String)> {
        if self.kind != ERROR_KIND {
            return None;
        }
        let code = self
            .fields
            .get("code")
            .and_then(|v| v.as_u64())
            .map(|c| c as u32)
            .unwrap_or(error_code::CRASH);
        let text = self
            .fields
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Some((code, text))
    }
}

impl MessageEnvelope {
    pub fn new(src: NodeId, dest: NodeId, body: Body) -> Self {
        Self { src, dest, body }
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from one JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Body type used for error replies.
pub const ERROR_KIND: &str = "error";

/// Error codes understood by the cluster-test harness.
pub mod error_code {
    pub const TIMEOUT: u32 = 0;
    pub const NOT_SUPPORTED: u32 = 10;
    pub const MALFORMED_REQUEST: u32 = 12;
    pub const CRASH: u32 = 13;
}
