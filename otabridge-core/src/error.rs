//! Error types for otabridge
//!
//! no_std compatible error handling

/// Failure reported by the underlying MQTT transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The client has no live session with the broker
    NotConnected,
    /// The broker or client library refused the operation
    Rejected,
    /// I/O error occurred
    IoError,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "Client is not connected"),
            TransportError::Rejected => write!(f, "Operation rejected by the client"),
            TransportError::IoError => write!(f, "I/O error occurred"),
        }
    }
}

impl core::error::Error for TransportError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// Malformed input, e.g. an empty topic name or filter
    InvalidArgument { reason: &'static str },
    /// Every event buffer is in flight
    ResourceExhausted { capacity: usize },
    /// Payload does not fit into an event buffer
    PayloadTooLarge { max_size: usize, actual_size: usize },
    /// Handle refers to a slot that was released since it was issued
    StaleHandle { slot: usize },
    /// Buffer was already free when released
    DoubleRelease { slot: usize },
    /// Shared client lock not taken in time
    LockTimeout { timeout_ms: u64 },
    /// The transport failed to carry out the operation
    TransportFailure { error: TransportError },
    /// Engine event queue is full
    QueueFull,
    /// Engine event queue has no consumer anymore
    QueueClosed,
    /// The update engine refused a control request
    EngineRejected { operation: &'static str },
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BridgeError::InvalidArgument { reason } => {
                write!(f, "Invalid argument: {}", reason)
            }
            BridgeError::ResourceExhausted { capacity } => {
                write!(f, "No event buffers available (capacity: {})", capacity)
            }
            BridgeError::PayloadTooLarge {
                max_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Payload too large: max {} bytes, actual {} bytes",
                    max_size, actual_size
                )
            }
            BridgeError::StaleHandle { slot } => {
                write!(f, "Stale handle for event buffer {}", slot)
            }
            BridgeError::DoubleRelease { slot } => {
                write!(f, "Event buffer {} released while already free", slot)
            }
            BridgeError::LockTimeout { timeout_ms } => {
                write!(f, "Could not take client lock within {} ms", timeout_ms)
            }
            BridgeError::TransportFailure { error } => {
                write!(f, "Transport failure: {}", error)
            }
            BridgeError::QueueFull => write!(f, "Engine event queue is full"),
            BridgeError::QueueClosed => write!(f, "Engine event queue is closed"),
            BridgeError::EngineRejected { operation } => {
                write!(f, "Update engine rejected {}", operation)
            }
        }
    }
}

impl core::error::Error for BridgeError {}

impl From<TransportError> for BridgeError {
    fn from(error: TransportError) -> Self {
        BridgeError::TransportFailure { error }
    }
}

pub type Result<T> = core::result::Result<T, BridgeError>;
