//! Columnar storage foundation for varve.
//!
//! This crate holds the in-memory building blocks the write path assembles
//! segments out of:
//! - Chunked byte buffers (presized column payloads and growable record
//!   storage with stable positions).
//! - A deduplicating string pool with structurally-distinct sentinel entries
//!   for "absent" and "not-a-number" text slots.
//! - Typed columns whose payload makes borrowed-vs-owned memory visible in
//!   the type.
//! - Segments: row-aligned column groups sharing one string pool.

#![forbid(unsafe_code)]

mod buffer;
mod column;
mod error;
mod pool;
mod presence;
mod segment;
mod types;

pub use crate::buffer::ChunkedBuffer;
pub use crate::column::{Column, ColumnData};
pub use crate::error::{ColumnarError, Result};
pub use crate::pool::{PoolOffset, PoolOptions, StringEntry, StringPool};
pub use crate::presence::PresenceMap;
pub use crate::segment::{Segment, SegmentDescriptor};
pub use crate::types::DataType;
