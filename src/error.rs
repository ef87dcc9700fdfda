// Error types shared across the matcher library.
//
// Data-format errors (InvalidSymbol, SequenceTooLong, PanelTooLarge) are
// recoverable by the caller; session lifecycle errors leave the session in a
// defined reusable state. Nothing here terminates the process.

use crate::session::BufferHandle;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for seqmatch operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input character outside the A/T/G/C alphabet
    #[error("invalid symbol {byte:#04x} at position {position}")]
    InvalidSymbol { byte: u8, position: usize },

    /// Sequence longer than the packed capacity
    #[error("sequence of length {length} exceeds the {}-symbol capacity", crate::codec::MAX_SEQ_LEN)]
    SequenceTooLong { length: usize },

    /// Reference panel larger than the cache can hold
    #[error("reference panel of {count} sequences exceeds the cache capacity of {}", crate::panel::MAX_PANEL_SIZE)]
    PanelTooLarge { count: usize },

    /// Transfer pool budget exhausted
    #[error("transfer pool exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Session operation requiring an open backend was called on a closed session
    #[error("session is not open")]
    DeviceNotOpen,

    /// Open was called on an already-open session
    #[error("session is already open")]
    AlreadyOpen,

    /// The compute backend could not be acquired, or died mid-batch
    #[error("compute backend unavailable")]
    BackendUnavailable,

    /// Buffer handle was never allocated through this session
    #[error("unknown buffer handle {handle}")]
    UnknownBuffer { handle: BufferHandle },

    /// A batch descriptor count does not fit the named buffer
    #[error("buffer {handle} too small: descriptor needs {needed} bytes, buffer holds {actual}")]
    BufferTooSmall {
        handle: BufferHandle,
        needed: usize,
        actual: usize,
    },

    /// The backend did not signal completion within the session timeout
    #[error("backend did not complete within {waited:?}")]
    BackendTimeout { waited: Duration },

    /// I/O error from the sequence readers or score writer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
