//! Error types for reader operations.
//!
//! Three families are kept apart because callers treat them differently:
//!
//! - [`ReaderError`]: the reader itself is unusable (unplugged, closed,
//!   misconfigured). Fatal for a scan session.
//! - [`ActivationError`]: a sensed tag could not be turned into a session,
//!   or an ISO-DEP exchange was refused. The scan loop skips the tag.
//! - [`BlockReadError`]: one memory unit could not be read. Isolated to that
//!   unit.

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that make the reader unusable.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Reader is not connected or has been disconnected.
    #[error("Reader disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Reader communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Reader initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Reader configuration error (bad connection string, bad scenario).
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Reader was already closed.
    #[error("Reader closed")]
    Closed,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}

/// Errors raised while activating a tag or exchanging APDUs with it.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// The response does not match any tag family the driver knows.
    #[error("Unsupported tag: {reason}")]
    Unsupported { reason: String },

    /// The tag explicitly refused the command.
    #[error("Protocol error: status 0x{status:04X}")]
    Protocol { status: u16 },

    /// The handshake completed but returned unusable data.
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The reader failed underneath the exchange.
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

impl ActivationError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn protocol(status: u16) -> Self {
        Self::Protocol { status }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}

/// Errors raised by a single block or service read.
#[derive(Debug, thiserror::Error)]
pub enum BlockReadError {
    /// The tag answered with an error status (e.g. read-protected block).
    #[error("Tag returned error status 0x{status:04X}")]
    Protocol { status: u16 },

    /// The block index lies outside the tag's memory.
    #[error("Block {index} out of range")]
    OutOfRange { index: u16 },

    /// The tag stopped answering mid-read.
    #[error("Tag left the field")]
    TagLost,

    /// The reader failed underneath the read.
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = ReaderError::disconnected("usb:0");
        assert!(matches!(error, ReaderError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Reader disconnected: usb:0");
    }

    #[test]
    fn test_timeout_error() {
        let error = ReaderError::timeout(3000);
        assert_eq!(error.to_string(), "Operation timeout after 3000ms");
    }

    #[test]
    fn test_configuration_error() {
        let error = ReaderError::configuration("unknown backend 'pcsc'");
        assert_eq!(
            error.to_string(),
            "Configuration error: unknown backend 'pcsc'"
        );
    }

    #[test]
    fn test_activation_protocol_status_is_hex() {
        let error = ActivationError::protocol(0x6700);
        assert_eq!(error.to_string(), "Protocol error: status 0x6700");
    }

    #[test]
    fn test_activation_wraps_reader_error_transparently() {
        let error: ActivationError = ReaderError::Closed.into();
        assert!(matches!(error, ActivationError::Reader(ReaderError::Closed)));
        assert_eq!(error.to_string(), "Reader closed");
    }

    #[test]
    fn test_block_read_error_display() {
        assert_eq!(
            BlockReadError::Protocol { status: 0x01A2 }.to_string(),
            "Tag returned error status 0x01A2"
        );
        assert_eq!(
            BlockReadError::OutOfRange { index: 16 }.to_string(),
            "Block 16 out of range"
        );
    }
}
