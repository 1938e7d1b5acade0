use flock_transport::error_code;

/// Protocol-level errors for flock.
///
/// Wraps transport errors and adds the request-handling failures a
/// single inbound message can hit.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Transport(#[from] flock_transport::TransportError),

    #[error("malformed {kind} request: {reason}")]
    MalformedRequest { kind: String, reason: String },

    #[error("unsupported message type: {0}")]
    UnsupportedKind(String),

    #[error("{node_id} answered {got}, expected {expected}")]
    UnexpectedReply {
        node_id: String,
        expected: &'static str,
        got: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Error code to put in the reply when this aborts a request.
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::MalformedRequest { .. } => error_code::MALFORMED_REQUEST,
            ProtocolError::UnsupportedKind(_) => error_code::NOT_SUPPORTED,
            ProtocolError::Transport(flock_transport::TransportError::Timeout { .. }) => {
                error_code::TIMEOUT
            }
            _ => error_code::CRASH,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_malformed() {
        let err = ProtocolError::MalformedRequest {
            kind: "broadcast".into(),
            reason: "missing field `message`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed broadcast request: missing field `message`"
        );
    }

    #[test]
    fn test_display_unsupported() {
        let err = ProtocolError::UnsupportedKind("cas".into());
        assert_eq!(err.to_string(), "unsupported message type: cas");
    }

    #[test]
    fn test_display_unexpected_reply() {
        let err = ProtocolError::UnexpectedReply {
            node_id: "n2".into(),
            expected: "broadcast_ok",
            got: "read_ok".into(),
        };
        assert_eq!(err.to_string(), "n2 answered read_ok, expected broadcast_ok");
    }

    #[test]
    fn test_codes() {
        let malformed = ProtocolError::MalformedRequest {
            kind: "read".into(),
            reason: String::new(),
        };
        assert_eq!(malformed.code(), 12);
        assert_eq!(ProtocolError::UnsupportedKind("x".into()).code(), 10);
        assert_eq!(ProtocolError::Config("bad".into()).code(), 13);

        let timeout = ProtocolError::Transport(flock_transport::TransportError::Timeout {
            node_id: "n1".parse().unwrap(),
        });
        assert_eq!(timeout.code(), 0);
    }
}
