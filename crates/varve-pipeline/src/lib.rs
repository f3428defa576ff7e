//! Write-path ingestion for varve.
//!
//! Converts externally-owned, possibly strided column buffers ("input
//! frames") into the internal columnar representation:
//! - Per-column dispatch choosing zero-copy reference, copy-flatten, sparse
//!   floating encoding, or string interning.
//! - Row-major slicing of a logical frame into physical segments.
//! - Row-range bookkeeping that keeps slice boundaries consistent across the
//!   frame after it has been partitioned.
//!
//! The crate is synchronous and single-threaded per column-write call;
//! callers parallelize, if at all, across disjoint columns and segments.

#![forbid(unsafe_code)]

mod aggregator;
mod error;
mod flatten;
mod frame;
mod slicing;
mod strings;

pub use crate::aggregator::SegmentAggregator;
pub use crate::error::{IngestError, Result};
pub use crate::flatten::{flatten, gather_handles};
pub use crate::frame::{
    ColumnSource, DecodeFailure, DecodeRuntime, GuardedBytes, InputFrame, RawColumnView,
    RuntimeGuard, TextColumnView, TextHandle,
};
pub use crate::slicing::{
    ingest_frame, plan_row_slices, ColRange, FrameSlice, RowRange, SliceOptions, SliceRangeTracker,
};
pub use crate::strings::{first_string_size, max_string_size};
