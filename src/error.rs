//! error taxonomy for the telemetry core.
//!
//! sample errors end the current poll cycle and nothing else; persistence
//! errors are logged by the history store and never undo an append.

use std::time::Duration;
use thiserror::Error;

/// why a poll cycle produced no reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// gateway unreachable or connection dropped mid-request
    #[error("transport error: {0}")]
    Transport(String),

    /// gateway answered with a non-success http status
    #[error("gateway returned status {0}")]
    Status(u16),

    /// the call did not finish within the configured timeout
    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),

    /// response body failed shape validation or carried a null value
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl SampleError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// true for every failure that happened before a payload was available
    pub fn is_transport(&self) -> bool {
        !matches!(self, SampleError::Malformed(_))
    }
}

impl From<reqwest::Error> for SampleError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            SampleError::Status(status.as_u16())
        } else if e.is_decode() {
            SampleError::Malformed(e.to_string())
        } else {
            SampleError::Transport(e.to_string())
        }
    }
}

/// snapshot read/write failure
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(serde_json::Error),

    #[error("snapshot decode error: {0}")]
    Decode(serde_json::Error),
}

/// actuator commands share the transport taxonomy of reads
pub type CommandError = SampleError;
