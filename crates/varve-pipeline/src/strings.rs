#![forbid(unsafe_code)]

use crate::error::{IngestError, Result};
use crate::slicing::FrameSlice;
use varve_columnar::{Column, StringEntry};

/// Length in bytes of the first row's string content in `slice`'s row range
/// of an interned text column.
///
/// Sentinel rows are NOT skipped here: an absent or not-a-number first row
/// yields 0 rather than the first real string's length. `max_string_size`
/// does skip sentinels; the divergence is intentional (see the repository
/// DESIGN notes) and pinned by tests.
pub fn first_string_size(
    column: &Column<'_>,
    slice: &FrameSlice,
    first_row_in_frame: usize,
) -> Result<usize> {
    let pool = column.pool().ok_or(IngestError::NoStringPool)?;
    let offset = slice.first_row_offset(first_row_in_frame);
    if slice.rows.is_empty() {
        return Ok(0);
    }

    match column.string_entry(offset)? {
        StringEntry::Str(token) => Ok(pool.resolve(token)?.len()),
        StringEntry::Absent | StringEntry::NotANumber => Ok(0),
    }
}

/// Maximum string content length across `slice`'s row range of an interned
/// text column, skipping both sentinels. Used to size fixed-width output
/// slots when materializing interned text back into fixed-width form.
pub fn max_string_size(
    column: &Column<'_>,
    slice: &FrameSlice,
    first_row_in_frame: usize,
) -> Result<usize> {
    let pool = column.pool().ok_or(IngestError::NoStringPool)?;
    let offset = slice.first_row_offset(first_row_in_frame);

    let mut max_length = 0usize;
    for row in 0..slice.rows.len() {
        match column.string_entry(offset + row)? {
            StringEntry::Str(token) => {
                max_length = max_length.max(pool.resolve(token)?.len());
            }
            StringEntry::Absent | StringEntry::NotANumber => continue,
        }
    }
    Ok(max_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SegmentAggregator;
    use crate::frame::{ColumnSource, DecodeRuntime, TextColumnView, TextHandle};
    use crate::slicing::{ColRange, RowRange};
    use varve_columnar::{DataType, PoolOptions, Segment};

    fn text_segment<'f>(handles: &'f [TextHandle<'f>]) -> Segment<'f> {
        let view = TextColumnView::contiguous(handles, DataType::Utf8Str).unwrap();
        let mut agg = SegmentAggregator::new(
            vec![DataType::Utf8Str],
            handles.len(),
            PoolOptions::default(),
        );
        agg.set_data(0, &ColumnSource::Text(view), &DecodeRuntime::new(), false)
            .unwrap();
        agg.finish().unwrap()
    }

    fn slice(start: usize, end: usize) -> FrameSlice {
        FrameSlice::new(RowRange::new(start, end), ColRange::new(0, 1))
    }

    #[test]
    fn max_skips_sentinels_first_does_not() {
        let handles = [
            TextHandle::Inline(b"a"),
            TextHandle::Absent,
            TextHandle::Inline(b"bb"),
            TextHandle::NotANumber,
            TextHandle::Inline(b"a"),
        ];
        let segment = text_segment(&handles);
        let column = segment.column(0).unwrap();

        let whole = slice(0, 5);
        assert_eq!(first_string_size(column, &whole, 0).unwrap(), 1);
        assert_eq!(max_string_size(column, &whole, 0).unwrap(), 2);

        // A slice whose first row holds a sentinel: the first size reports
        // 0 even though real strings follow in range.
        let tail = slice(1, 4);
        assert_eq!(first_string_size(column, &tail, 0).unwrap(), 0);
        assert_eq!(max_string_size(column, &tail, 0).unwrap(), 2);
    }

    #[test]
    fn all_sentinel_range_has_zero_max() {
        let handles = [TextHandle::Absent, TextHandle::NotANumber];
        let segment = text_segment(&handles);
        let column = segment.column(0).unwrap();

        let whole = slice(0, 2);
        assert_eq!(first_string_size(column, &whole, 0).unwrap(), 0);
        assert_eq!(max_string_size(column, &whole, 0).unwrap(), 0);
    }

    #[test]
    fn missing_pool_is_reported() {
        let raw = [0u8; 8];
        let column = varve_columnar::Column::new(
            DataType::UInt64,
            1,
            varve_columnar::ColumnData::Borrowed(&raw),
        );
        let err = first_string_size(&column, &slice(0, 1), 0).unwrap_err();
        assert!(matches!(err, IngestError::NoStringPool));
    }

    #[test]
    fn frame_offset_translates_slice_rows() {
        // A frame starting at absolute row 100; the segment's column stores
        // its 3 rows locally at positions 0..3.
        let handles = [
            TextHandle::Inline(b"xyz"),
            TextHandle::Inline(b"pq"),
            TextHandle::Inline(b"r"),
        ];
        let segment = text_segment(&handles);
        let column = segment.column(0).unwrap();

        let s = slice(100, 103);
        assert_eq!(first_string_size(column, &s, 100).unwrap(), 3);
        assert_eq!(max_string_size(column, &s, 100).unwrap(), 3);
    }
}
