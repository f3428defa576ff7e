#![forbid(unsafe_code)]

use thiserror::Error;
use varve_columnar::{ColumnarError, DataType};

/// Result type for write-path operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while populating columns and tracking slice ranges.
///
/// All are reported synchronously to the immediate caller; retry policy
/// (re-attempting a column write, skipping, aborting the ingestion) belongs
/// to the caller, never to this crate.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Columnar(#[from] ColumnarError),

    // --- Usage errors ---------------------------------------------------------------------
    #[error("destination column expects {expected}, source view holds {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("source view geometry does not match the destination: {detail}")]
    ShapeMismatch { detail: String },

    #[error("sparse encoding requested for a {tag} column; only floating-point columns can be sparsified")]
    SparsifyNonFloat { tag: DataType },

    #[error("column {col} was never populated before the segment was sealed")]
    ColumnNotPopulated { col: usize },

    #[error("interned text column has no string pool attached")]
    NoStringPool,

    // --- Row bookkeeping ------------------------------------------------------------------
    #[error("row {row} falls outside the slice's row range [{start}, {end})")]
    RowOutOfSlice {
        row: usize,
        start: usize,
        end: usize,
    },

    // --- Text decoding --------------------------------------------------------------------
    /// One row of a text column failed to decode. `row_in_slice` is the row
    /// index within the current write slice, not the absolute frame row;
    /// rows past it are left unpopulated and the whole column write must be
    /// treated as failed.
    #[error("string encoding error at row {row_in_slice} of the current write slice: {reason}")]
    StringEncoding { row_in_slice: usize, reason: String },
}
