//! Error types for MRBus packet handling and the throttle bridge

use thiserror::Error;

/// Result type for MRBus bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types encountered while decoding packets or driving collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Not enough bytes to hold a frame header
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Length byte disagrees with the received frame size
    #[error("Length mismatch: header says {declared} bytes, frame has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Embedded checksum does not match the recomputed one
    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Packet does not fit in a single-byte length field
    #[error("Frame too long: {0} bytes")]
    FrameTooLong(usize),

    /// Locomotive or bus address out of range
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Function index outside 0-28
    #[error("Invalid function: {0}")]
    InvalidFunction(u8),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport layer failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Host throttle collaborator refused an operation
    #[error("Throttle error: {0}")]
    Throttle(String),
}

impl BridgeError {
    /// Create a new InsufficientData error
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        BridgeError::InsufficientData(msg.into())
    }

    /// Create a new InvalidAddress error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        BridgeError::InvalidAddress(msg.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        BridgeError::InvalidConfig(msg.into())
    }

    /// Create a new Throttle error
    pub fn throttle(msg: impl Into<String>) -> Self {
        BridgeError::Throttle(msg.into())
    }
}

/// Failures reported by the radio/serial transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Send did not complete within the configured timeout
    #[error("send timed out")]
    Timeout,

    /// Link to the radio module is down
    #[error("transport disconnected")]
    Disconnected,

    /// Any other I/O failure
    #[error("I/O failure: {0}")]
    Io(String),
}
