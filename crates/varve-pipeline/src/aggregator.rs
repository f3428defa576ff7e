#![forbid(unsafe_code)]

use crate::error::{IngestError, Result};
use crate::flatten::{flatten, gather_handles};
use crate::frame::{ColumnSource, DecodeRuntime, RawColumnView, RuntimeGuard, TextColumnView, TextHandle};
use log::{debug, trace};
use std::sync::Arc;
use varve_columnar::{
    ChunkedBuffer, Column, ColumnData, DataType, PoolOptions, PresenceMap, Segment, StringEntry,
    StringPool,
};

/// Builds one segment: accepts one source view per destination column,
/// chooses the storage strategy per type tag, and seals the result into a
/// [`Segment`] sharing a single string pool.
///
/// One aggregator populates one physical slice. Rows are written in source
/// order; columns are independent and may be populated in any order, but a
/// column write that fails leaves that column unpopulated and the segment
/// cannot be sealed until every column has been written successfully.
pub struct SegmentAggregator<'f> {
    tags: Vec<DataType>,
    rows: usize,
    columns: Vec<Option<Column<'f>>>,
    pool: StringPool,
}

impl<'f> SegmentAggregator<'f> {
    pub fn new(tags: Vec<DataType>, rows: usize, pool_options: PoolOptions) -> Self {
        let columns = tags.iter().map(|_| None).collect();
        Self {
            tags,
            rows,
            columns,
            pool: StringPool::new(pool_options),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_tags(&self) -> &[DataType] {
        &self.tags
    }

    /// The pool under construction; sealed into shared ownership by
    /// [`SegmentAggregator::finish`].
    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    /// Populate destination column `col` from `source`.
    ///
    /// Dispatches over the destination tag: fixed-width string slots are
    /// copied verbatim, variable-length text is interned (sentinel-aware,
    /// decoding guarded handles under the runtime's lazily-acquired lock),
    /// and numeric/boolean data is referenced zero-copy when C-style
    /// contiguous, copy-flattened otherwise, or sparsified on request for
    /// floating columns. The match is wildcard-free: a new tag fails to
    /// compile until this dispatch covers it.
    pub fn set_data(
        &mut self,
        col: usize,
        source: &ColumnSource<'f>,
        runtime: &DecodeRuntime,
        sparsify_floats: bool,
    ) -> Result<()> {
        let tag = *self
            .tags
            .get(col)
            .ok_or_else(|| IngestError::ShapeMismatch {
                detail: format!(
                    "column {col} out of range for a segment of {} columns",
                    self.tags.len()
                ),
            })?;
        if source.tag() != tag {
            return Err(IngestError::TypeMismatch {
                expected: tag,
                actual: source.tag(),
            });
        }
        if tag != DataType::Empty && source.rows() != self.rows {
            return Err(IngestError::ShapeMismatch {
                detail: format!(
                    "source covers {} rows, segment covers {}",
                    source.rows(),
                    self.rows
                ),
            });
        }
        let data = match tag {
            DataType::FixedStr => self.fixed_string_data(source)?,
            DataType::Utf8Str | DataType::BytesStr => {
                self.interned_string_data(source, runtime, tag)?
            }
            DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
            | DataType::Bool => self.numeric_data(source, tag, sparsify_floats, col)?,
            DataType::Empty => ColumnData::Empty,
        };

        self.columns[col] = Some(Column::new(tag, self.rows, data));
        Ok(())
    }

    /// Seal the segment: every column must have been populated. Interned
    /// text columns receive shared ownership of the pool; the segment is
    /// the longest-lived holder.
    pub fn finish(self) -> Result<Segment<'f>> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (col, slot) in self.columns.into_iter().enumerate() {
            columns.push(slot.ok_or(IngestError::ColumnNotPopulated { col })?);
        }

        let pool = Arc::new(self.pool);
        for column in &mut columns {
            if matches!(column.data(), ColumnData::Strings(_)) {
                column.attach_pool(Arc::clone(&pool));
            }
        }
        Ok(Segment::new(self.rows, columns, pool))
    }

    fn fixed_string_data(&mut self, source: &ColumnSource<'f>) -> Result<ColumnData<'f>> {
        let view = expect_raw(source)?;
        let slot = view.elem_size();
        let mut buf = ChunkedBuffer::presized(self.rows * slot)?;
        let dst = buf.as_mut_slice();
        for row in 0..self.rows {
            dst[row * slot..(row + 1) * slot].copy_from_slice(view.row_bytes(row));
        }
        Ok(ColumnData::FixedStrings { buf, slot })
    }

    fn interned_string_data(
        &mut self,
        source: &ColumnSource<'f>,
        runtime: &DecodeRuntime,
        tag: DataType,
    ) -> Result<ColumnData<'f>> {
        let view = expect_text(source)?;
        // Strided handle arrays are gathered up front so the hot loop walks
        // them uniformly.
        let gathered: Option<Vec<TextHandle<'f>>> = if view.is_contiguous() {
            None
        } else {
            Some(gather_handles(view))
        };

        let mut buf = ChunkedBuffer::presized(self.rows * 8)?;
        let dst = buf.as_mut_slice();
        let mut guard: Option<RuntimeGuard<'_>> = None;

        for row in 0..self.rows {
            let handle = match &gathered {
                Some(handles) => handles[row],
                None => view.handle(row),
            };

            let entry = match handle {
                TextHandle::Absent => StringEntry::Absent,
                TextHandle::NotANumber => StringEntry::NotANumber,
                TextHandle::Inline(bytes) => intern_checked(&mut self.pool, tag, bytes, row)?,
                TextHandle::Guarded(value) => {
                    // Held for the rest of the column: one guarded value
                    // predicts more in the same column.
                    if guard.is_none() {
                        trace!("acquiring decode-runtime lock for guarded text values");
                        guard = Some(runtime.lock());
                    }
                    let held = guard.as_ref().expect("guard acquired above");
                    let bytes = value.read(held).map_err(|failure| {
                        IngestError::StringEncoding {
                            row_in_slice: row,
                            reason: failure.reason,
                        }
                    })?;
                    intern_checked(&mut self.pool, tag, bytes, row)?
                }
            };
            dst[row * 8..(row + 1) * 8].copy_from_slice(&entry.to_raw().to_le_bytes());
        }

        Ok(ColumnData::Strings(buf))
    }

    fn numeric_data(
        &mut self,
        source: &ColumnSource<'f>,
        tag: DataType,
        sparsify_floats: bool,
        col: usize,
    ) -> Result<ColumnData<'f>> {
        let view = expect_raw(source)?;
        let width = tag.width().expect("numeric and bool tags have a fixed width");
        if view.elem_size() != width {
            return Err(IngestError::ShapeMismatch {
                detail: format!(
                    "{tag} elements are {width} bytes, view declares {}",
                    view.elem_size()
                ),
            });
        }

        if sparsify_floats {
            if !tag.is_float() {
                return Err(IngestError::SparsifyNonFloat { tag });
            }
            return sparse_float_data(view, tag, width);
        }

        match view.contiguous_bytes() {
            Some(bytes) => Ok(ColumnData::Borrowed(bytes)),
            None => {
                debug!(
                    "column {col} data is not row-major contiguous; flattening will copy \
                     (stride={}, elem_size={width})",
                    view.stride()
                );
                Ok(ColumnData::Owned(flatten(view)?))
            }
        }
    }
}

fn expect_raw<'s, 'f>(source: &'s ColumnSource<'f>) -> Result<&'s RawColumnView<'f>> {
    match source {
        ColumnSource::Raw(view) => Ok(view),
        ColumnSource::Text(view) => Err(IngestError::ShapeMismatch {
            detail: format!("{} destination requires a raw source view", view.tag()),
        }),
    }
}

fn expect_text<'s, 'f>(source: &'s ColumnSource<'f>) -> Result<&'s TextColumnView<'f>> {
    match source {
        ColumnSource::Text(view) => Ok(view),
        ColumnSource::Raw(view) => Err(IngestError::ShapeMismatch {
            detail: format!("{} destination requires a text source view", view.tag()),
        }),
    }
}

fn intern_checked(
    pool: &mut StringPool,
    tag: DataType,
    bytes: &[u8],
    row: usize,
) -> Result<StringEntry> {
    if tag == DataType::Utf8Str {
        std::str::from_utf8(bytes).map_err(|err| IngestError::StringEncoding {
            row_in_slice: row,
            reason: err.to_string(),
        })?;
    }
    let offset = pool.intern(bytes)?;
    Ok(StringEntry::Str(offset))
}

/// Dense non-missing values plus a presence bitmap; not-a-number entries are
/// omitted from the dense payload.
fn sparse_float_data<'f>(
    view: &RawColumnView<'_>,
    tag: DataType,
    width: usize,
) -> Result<ColumnData<'f>> {
    let present = |bytes: &[u8]| -> bool {
        match tag {
            DataType::Float32 => !f32::from_le_bytes(bytes.try_into().expect("width 4")).is_nan(),
            DataType::Float64 => !f64::from_le_bytes(bytes.try_into().expect("width 8")).is_nan(),
            _ => unreachable!("sparse encoding is gated to floating tags"),
        }
    };

    let dense_rows = (0..view.rows())
        .filter(|&row| present(view.row_bytes(row)))
        .count();

    let mut values = ChunkedBuffer::presized(dense_rows * width)?;
    let mut presence = PresenceMap::with_capacity_bits(view.rows());
    let dst = values.as_mut_slice();
    let mut cursor = 0usize;
    for row in 0..view.rows() {
        let bytes = view.row_bytes(row);
        if present(bytes) {
            dst[cursor * width..(cursor + 1) * width].copy_from_slice(bytes);
            cursor += 1;
            presence.push(true);
        } else {
            presence.push(false);
        }
    }

    Ok(ColumnData::Sparse { values, presence })
}
