#![forbid(unsafe_code)]

use crate::error::{IngestError, Result};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use varve_columnar::DataType;

/// Read-only description of one externally-owned numeric, boolean, or
/// fixed-width-string column: base bytes, row stride, element size, rows to
/// write, starting row, and a type tag.
///
/// The view does not own the memory; the caller guarantees it stays valid
/// and unmodified for the duration of one aggregation call (and, for
/// zero-copy columns, until the produced segment is converted or persisted;
/// the `'f` lifetime enforces that window at compile time).
#[derive(Clone, Copy, Debug)]
pub struct RawColumnView<'f> {
    bytes: &'f [u8],
    /// Bytes between consecutive rows. Equal to `elem_size` for C-style
    /// contiguous memory.
    stride: usize,
    elem_size: usize,
    rows: usize,
    start_row: usize,
    tag: DataType,
}

impl<'f> RawColumnView<'f> {
    pub fn new(
        bytes: &'f [u8],
        tag: DataType,
        elem_size: usize,
        stride: usize,
        rows: usize,
        start_row: usize,
    ) -> Result<Self> {
        if rows > 0 && elem_size > 0 {
            if stride < elem_size {
                return Err(IngestError::ShapeMismatch {
                    detail: format!("stride {stride} is smaller than element size {elem_size}"),
                });
            }
            let last = (start_row + rows - 1) * stride + elem_size;
            if last > bytes.len() {
                return Err(IngestError::ShapeMismatch {
                    detail: format!(
                        "view of {rows} rows starting at row {start_row} needs {last} bytes, \
                         source holds {}",
                        bytes.len()
                    ),
                });
            }
        }
        Ok(Self {
            bytes,
            stride,
            elem_size,
            rows,
            start_row,
            tag,
        })
    }

    /// A C-style contiguous view starting at row 0.
    pub fn contiguous(bytes: &'f [u8], tag: DataType, elem_size: usize, rows: usize) -> Result<Self> {
        Self::new(bytes, tag, elem_size, elem_size, rows, 0)
    }

    pub fn tag(&self) -> DataType {
        self.tag
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Row-major unit-stride layout, eligible for zero-copy reference.
    pub fn is_contiguous(&self) -> bool {
        self.stride == self.elem_size
    }

    /// The `i`-th row's element bytes, located via the stride.
    pub fn row_bytes(&self, i: usize) -> &'f [u8] {
        debug_assert!(i < self.rows, "row out of view bounds");
        let offset = (self.start_row + i) * self.stride;
        &self.bytes[offset..offset + self.elem_size]
    }

    /// The whole window as one contiguous slice, when the layout allows a
    /// zero-copy reference.
    pub fn contiguous_bytes(&self) -> Option<&'f [u8]> {
        if !self.is_contiguous() {
            return None;
        }
        let start = self.start_row * self.stride;
        Some(&self.bytes[start..start + self.rows * self.elem_size])
    }

    /// A sub-view over `rows` rows starting `start` rows into this view.
    pub fn window(&self, start: usize, rows: usize) -> Result<Self> {
        if start + rows > self.rows {
            return Err(IngestError::ShapeMismatch {
                detail: format!(
                    "window [{start}, {}) exceeds the view's {} rows",
                    start + rows,
                    self.rows
                ),
            });
        }
        Self::new(
            self.bytes,
            self.tag,
            self.elem_size,
            self.stride,
            rows,
            self.start_row + start,
        )
    }
}

/// Failure reported by the embedding runtime while materializing a handle's
/// bytes.
#[derive(Debug, Clone)]
pub struct DecodeFailure {
    pub reason: String,
}

/// Exclusivity lock of the embedding runtime that owns non-trivial string
/// values.
///
/// Reading a [`TextHandle::Guarded`] handle requires the runtime's guard.
/// The write path acquires it lazily, on the first guarded handle it meets
/// in a column, and then holds it for the remainder of that column: one such
/// value predicts more in the same column, and per-value lock churn costs
/// more than the longer hold.
#[derive(Debug, Default)]
pub struct DecodeRuntime {
    lock: Mutex<()>,
}

/// Scoped guard over the runtime; released on drop.
pub struct RuntimeGuard<'r> {
    _held: MutexGuard<'r, ()>,
}

impl DecodeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> RuntimeGuard<'_> {
        RuntimeGuard {
            _held: self.lock.lock().expect("decode runtime lock poisoned"),
        }
    }
}

/// A runtime-owned string value whose bytes can only be read while the
/// runtime's exclusivity guard is held.
pub trait GuardedBytes {
    fn read(&self, guard: &RuntimeGuard<'_>) -> std::result::Result<&[u8], DecodeFailure>;
}

/// One row of a variable-length text column.
#[derive(Clone, Copy)]
pub enum TextHandle<'f> {
    /// Explicit "no value" marker.
    Absent,
    /// Floating not-a-number marker occupying a text slot.
    NotANumber,
    /// Plain bytes readable without the runtime.
    Inline(&'f [u8]),
    /// Runtime-owned value; read under the runtime's exclusivity lock.
    Guarded(&'f dyn GuardedBytes),
}

impl fmt::Debug for TextHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextHandle::Absent => f.write_str("Absent"),
            TextHandle::NotANumber => f.write_str("NotANumber"),
            TextHandle::Inline(bytes) => f.debug_tuple("Inline").field(bytes).finish(),
            TextHandle::Guarded(_) => f.write_str("Guarded(..)"),
        }
    }
}

/// Read-only description of one externally-owned variable-length text
/// column: one handle per row, possibly strided within the handle array.
#[derive(Clone, Copy, Debug)]
pub struct TextColumnView<'f> {
    handles: &'f [TextHandle<'f>],
    /// Elements between consecutive rows in `handles`; 1 for contiguous.
    stride_elems: usize,
    rows: usize,
    start_row: usize,
    tag: DataType,
}

impl<'f> TextColumnView<'f> {
    pub fn new(
        handles: &'f [TextHandle<'f>],
        tag: DataType,
        stride_elems: usize,
        rows: usize,
        start_row: usize,
    ) -> Result<Self> {
        if !matches!(tag, DataType::Utf8Str | DataType::BytesStr) {
            return Err(IngestError::ShapeMismatch {
                detail: format!("text view built with non-text tag {tag}"),
            });
        }
        if stride_elems == 0 {
            return Err(IngestError::ShapeMismatch {
                detail: "text view stride must be at least one element".to_owned(),
            });
        }
        if rows > 0 {
            let last = (start_row + rows - 1) * stride_elems;
            if last >= handles.len() {
                return Err(IngestError::ShapeMismatch {
                    detail: format!(
                        "view of {rows} rows starting at row {start_row} needs handle {last}, \
                         source holds {}",
                        handles.len()
                    ),
                });
            }
        }
        Ok(Self {
            handles,
            stride_elems,
            rows,
            start_row,
            tag,
        })
    }

    /// A contiguous view over every handle in the slice.
    pub fn contiguous(handles: &'f [TextHandle<'f>], tag: DataType) -> Result<Self> {
        Self::new(handles, tag, 1, handles.len(), 0)
    }

    pub fn tag(&self) -> DataType {
        self.tag
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride_elems == 1
    }

    pub fn handle(&self, i: usize) -> TextHandle<'f> {
        debug_assert!(i < self.rows, "row out of view bounds");
        self.handles[(self.start_row + i) * self.stride_elems]
    }

    /// A sub-view over `rows` rows starting `start` rows into this view.
    pub fn window(&self, start: usize, rows: usize) -> Result<Self> {
        if start + rows > self.rows {
            return Err(IngestError::ShapeMismatch {
                detail: format!(
                    "window [{start}, {}) exceeds the view's {} rows",
                    start + rows,
                    self.rows
                ),
            });
        }
        Self::new(
            self.handles,
            self.tag,
            self.stride_elems,
            rows,
            self.start_row + start,
        )
    }
}

/// One destination column's source data.
#[derive(Clone, Copy, Debug)]
pub enum ColumnSource<'f> {
    Raw(RawColumnView<'f>),
    Text(TextColumnView<'f>),
}

impl<'f> ColumnSource<'f> {
    pub fn tag(&self) -> DataType {
        match self {
            ColumnSource::Raw(view) => view.tag(),
            ColumnSource::Text(view) => view.tag(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            ColumnSource::Raw(view) => view.rows(),
            ColumnSource::Text(view) => view.rows(),
        }
    }

    pub fn window(&self, start: usize, rows: usize) -> Result<ColumnSource<'f>> {
        Ok(match self {
            ColumnSource::Raw(view) => ColumnSource::Raw(view.window(start, rows)?),
            ColumnSource::Text(view) => ColumnSource::Text(view.window(start, rows)?),
        })
    }
}

/// The transient, per-ingestion-call description of caller memory: one
/// source per destination column, all covering the same `rows` rows.
#[derive(Debug, Default)]
pub struct InputFrame<'f> {
    columns: Vec<ColumnSource<'f>>,
    rows: usize,
}

impl<'f> InputFrame<'f> {
    pub fn new(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    pub fn push_column(&mut self, source: ColumnSource<'f>) -> Result<()> {
        if source.rows() != self.rows && source.tag() != DataType::Empty {
            return Err(IngestError::ShapeMismatch {
                detail: format!(
                    "column {} covers {} rows, frame declares {}",
                    self.columns.len(),
                    source.rows(),
                    self.rows
                ),
            });
        }
        self.columns.push(source);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnSource<'f>] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_view_walks_rows_by_stride() {
        // Three u16 values interleaved with 2 bytes of padding each.
        let bytes: Vec<u8> = [1u16, 0xDEAD, 2, 0xDEAD, 3, 0xDEAD]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let view = RawColumnView::new(&bytes, DataType::UInt16, 2, 4, 3, 0).unwrap();

        assert!(!view.is_contiguous());
        assert!(view.contiguous_bytes().is_none());
        assert_eq!(view.row_bytes(0), 1u16.to_le_bytes());
        assert_eq!(view.row_bytes(1), 2u16.to_le_bytes());
        assert_eq!(view.row_bytes(2), 3u16.to_le_bytes());
    }

    #[test]
    fn contiguous_view_exposes_its_window() {
        let bytes: Vec<u8> = (0u32..4).flat_map(|v| v.to_le_bytes()).collect();
        let view = RawColumnView::contiguous(&bytes, DataType::UInt32, 4, 4).unwrap();
        let window = view.window(1, 2).unwrap();

        let expected: Vec<u8> = (1u32..3).flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(window.contiguous_bytes().unwrap(), expected.as_slice());
    }

    #[test]
    fn view_construction_rejects_bad_geometry() {
        let bytes = [0u8; 8];
        assert!(RawColumnView::new(&bytes, DataType::UInt32, 4, 4, 3, 0).is_err());
        assert!(RawColumnView::new(&bytes, DataType::UInt32, 4, 2, 2, 0).is_err());

        let view = RawColumnView::contiguous(&bytes, DataType::UInt32, 4, 2).unwrap();
        assert!(view.window(1, 2).is_err());
    }

    #[test]
    fn text_view_strides_over_handles() {
        let handles = [
            TextHandle::Inline(b"a"),
            TextHandle::Absent,
            TextHandle::Inline(b"b"),
            TextHandle::Absent,
        ];
        let view = TextColumnView::new(&handles, DataType::Utf8Str, 2, 2, 0).unwrap();

        assert!(!view.is_contiguous());
        assert!(matches!(view.handle(0), TextHandle::Inline(x) if x == b"a"));
        assert!(matches!(view.handle(1), TextHandle::Inline(x) if x == b"b"));
    }

    #[test]
    fn frame_rejects_row_count_mismatches() {
        let bytes = [0u8; 8];
        let view = RawColumnView::contiguous(&bytes, DataType::UInt64, 8, 1).unwrap();
        let mut frame = InputFrame::new(2);
        assert!(frame.push_column(ColumnSource::Raw(view)).is_err());
    }
}
