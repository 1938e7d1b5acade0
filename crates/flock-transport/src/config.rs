/// Configuration for a [`Node`](crate::Node).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use flock_transport::NodeConfig;
///
/// let config = NodeConfig::new()
///     .max_message_size(2 * 1024 * 1024)
///     .recv_buffer(1024);
/// ```
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Maximum inbound line length in bytes.
    pub(crate) max_message_size: usize,
    /// Channel buffer size for inbound requests.
    pub(crate) recv_buffer: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self {
            max_message_size: 1024 * 1024, // 1 MB
            recv_buffer: 256,
        }
    }

    /// Set maximum inbound message size (default: 1 MB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the channel buffer size for inbound requests (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), crate::TransportError> {
        if self.recv_buffer == 0 {
            return Err(crate::TransportError::Config(
                "recv_buffer must be at least 1".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(crate::TransportError::Config(
                "max_message_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
