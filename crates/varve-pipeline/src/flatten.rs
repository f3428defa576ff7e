#![forbid(unsafe_code)]

use crate::error::Result;
use crate::frame::{RawColumnView, TextColumnView, TextHandle};
use varve_columnar::ChunkedBuffer;

/// Gather a strided view into a freshly owned contiguous buffer of exactly
/// `rows * elem_size` bytes, in row order.
///
/// This is the fallback whenever a zero-copy reference is impossible: it
/// trades a full copy for uniform contiguous downstream access. The source
/// view is never mutated, and the returned buffer has no lifetime coupling
/// to the external memory.
pub fn flatten(view: &RawColumnView<'_>) -> Result<ChunkedBuffer> {
    let elem_size = view.elem_size();
    let mut buf = ChunkedBuffer::presized(view.rows() * elem_size)?;
    let dst = buf.as_mut_slice();
    for row in 0..view.rows() {
        dst[row * elem_size..(row + 1) * elem_size].copy_from_slice(view.row_bytes(row));
    }
    Ok(buf)
}

/// Gather a strided text view's handles into a contiguous array, so the
/// per-row interning loop can walk them uniformly.
pub fn gather_handles<'f>(view: &TextColumnView<'f>) -> Vec<TextHandle<'f>> {
    (0..view.rows()).map(|row| view.handle(row)).collect()
}
