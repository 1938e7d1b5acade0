/// Typed message bodies.
///
/// The transport carries bodies as loose JSON; handlers work with
/// [`Payload`]. Conversion in either direction goes through the flat
/// `{"type": ..., fields...}` object form.
use serde::{Deserialize, Serialize};

use flock_transport::Body;

use crate::error::ProtocolError;
use crate::types::{TopologyMap, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Broadcast { message: Value },
    BroadcastOk {},
    Read {},
    ReadOk { messages: Vec<Value> },
    Topology { topology: TopologyMap },
    TopologyOk {},
    Generate {},
    GenerateOk { id: String },
    /// Any `type` not listed above. Never sent.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl Payload {
    /// Wire name of this payload's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Broadcast { .. } => "broadcast",
            Payload::BroadcastOk {} => "broadcast_ok",
            Payload::Read {} => "read",
            Payload::ReadOk { .. } => "read_ok",
            Payload::Topology { .. } => "topology",
            Payload::TopologyOk {} => "topology_ok",
            Payload::Generate {} => "generate",
            Payload::GenerateOk { .. } => "generate_ok",
            Payload::Unknown => "unknown",
        }
    }

    /// Decode a transport body.
    ///
    /// Unknown `type` → [`ProtocolError::UnsupportedKind`]; known type with
    /// missing or wrong-typed fields → [`ProtocolError::MalformedRequest`].
    pub fn from_body(body: &Body) -> Result<Self, ProtocolError> {
        let mut object = body.fields.clone();
        object.insert("type".into(), body.kind.clone().into());

        let payload = serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            ProtocolError::MalformedRequest {
                kind: body.kind.clone(),
                reason: e.to_string(),
            }
        })?;

        match payload {
            Payload::Unknown => Err(ProtocolError::UnsupportedKind(body.kind.clone())),
            payload => Ok(payload),
        }
    }

    /// Encode as a transport body (ids left unset).
    pub fn to_body(&self) -> Result<Body, ProtocolError> {
        let value = serde_json::to_value(self)?;
        Ok(Body::from_value(value)?)
    }
}
