#![forbid(unsafe_code)]

use crate::types::DataType;
use thiserror::Error;

/// Result type for columnar storage operations.
pub type Result<T> = std::result::Result<T, ColumnarError>;

/// Errors raised by the storage foundation.
///
/// Every variant is synchronous and local to the failing call; nothing here
/// is retried internally.
#[derive(Debug, Error)]
pub enum ColumnarError {
    // --- Memory ---------------------------------------------------------------------------
    #[error("allocation failure: could not reserve {bytes} bytes")]
    AllocationFailure { bytes: usize },

    // --- Buffer / pool addressing ---------------------------------------------------------
    #[error("position {pos} (+{len} bytes) does not address stored content (buffer holds {buffer_len} bytes)")]
    OffsetOutOfBounds { pos: u64, len: usize, buffer_len: u64 },

    #[error("string of {len} bytes exceeds the maximum pool record size")]
    StringTooLarge { len: usize },

    #[error("string pool is full: the next record would collide with the reserved sentinel offsets")]
    PoolOffsetSpaceExhausted,

    // --- Column access --------------------------------------------------------------------
    #[error("row {row} is out of bounds for a column of {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },

    #[error("cannot read a {requested} value from a {actual} column")]
    TypeMismatch {
        requested: &'static str,
        actual: DataType,
    },
}
