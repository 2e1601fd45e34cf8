//! CABAC error types.

use thiserror::Error;

/// CABAC coding error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CabacError {
    /// The decoder needed a byte past the end of its input.
    #[error("Buffer underrun at byte {position}")]
    BufferUnderrun {
        /// Number of bytes already consumed.
        position: usize,
    },

    /// The encoder ran out of output space.
    #[error("Buffer overflow: sink capacity of {capacity} bytes exhausted")]
    BufferOverflow {
        /// Sink capacity in bytes.
        capacity: usize,
    },

    /// A context id outside the caller's context array.
    #[error("Invalid context index {index} (array holds {len})")]
    InvalidContext {
        /// Requested index.
        index: usize,
        /// Length of the context array.
        len: usize,
    },

    /// No terminate symbol where the caller expected the end of a unit.
    #[error("Expected end of stream at byte {position}, stream continues")]
    TerminationMismatch {
        /// Bytes consumed when the check was made.
        position: usize,
    },

    /// Coding was attempted after the stream was terminated.
    #[error("Stream already terminated")]
    Terminated,

    /// A context holds a state the active state table does not define.
    #[error("Probability state {0} is outside the state table")]
    InvalidState(u8),

    /// Malformed base probability tables.
    #[error("Invalid state table: {0}")]
    InvalidTable(String),

    /// Illegal binarization parameters.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Decoded data cannot be represented.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),
}

/// CABAC result type.
pub type Result<T> = std::result::Result<T, CabacError>;
