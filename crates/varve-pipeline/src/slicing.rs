#![forbid(unsafe_code)]

use crate::aggregator::SegmentAggregator;
use crate::error::{IngestError, Result};
use crate::frame::{DecodeRuntime, InputFrame};
use varve_columnar::{PoolOptions, Segment};

/// Half-open row range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted row range");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }
}

/// Half-open column range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColRange {
    pub start: usize,
    pub end: usize,
}

impl ColRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted column range");
        Self { start, end }
    }
}

/// One physical partition of a logical frame: a row range, a column range,
/// and a deferred handle (index into the produced segment list) for the
/// segment holding its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSlice {
    pub rows: RowRange,
    pub cols: ColRange,
    pub segment: Option<usize>,
}

impl FrameSlice {
    pub fn new(rows: RowRange, cols: ColRange) -> Self {
        Self {
            rows,
            cols,
            segment: None,
        }
    }

    /// Translate an absolute frame row into this slice's local storage
    /// position.
    pub fn local_row(&self, row: usize) -> Result<usize> {
        if !self.rows.contains(row) {
            return Err(IngestError::RowOutOfSlice {
                row,
                start: self.rows.start,
                end: self.rows.end,
            });
        }
        Ok(row - self.rows.start)
    }

    /// Position of this slice's first row within the frame's dense storage,
    /// given the frame's first row.
    pub fn first_row_offset(&self, first_row_in_frame: usize) -> usize {
        self.rows.start - first_row_in_frame
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SliceOptions {
    /// Maximum rows per physical slice; the last slice of a frame holds the
    /// remainder.
    pub rows_per_slice: usize,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            rows_per_slice: 100_000,
        }
    }
}

/// Partition `total_rows` into row-major slice ranges. Covers `[0,
/// total_rows)` exactly, with no gaps or overlaps.
pub fn plan_row_slices(total_rows: usize, options: &SliceOptions) -> Vec<RowRange> {
    let step = options.rows_per_slice.max(1);
    let mut ranges = Vec::with_capacity(total_rows.div_ceil(step).max(1));
    let mut start = 0;
    while start < total_rows {
        let end = (start + step).min(total_rows);
        ranges.push(RowRange::new(start, end));
        start = end;
    }
    if ranges.is_empty() {
        ranges.push(RowRange::new(0, 0));
    }
    ranges
}

/// Ordered slice descriptors for one logical frame, with the row-count
/// bookkeeping that keeps their ranges consistent after the frame has been
/// physically partitioned.
///
/// Slices are ordered row-block-major: all column stripes of one row block
/// appear consecutively, each row block starting again from the first
/// column stripe.
#[derive(Debug, Default)]
pub struct SliceRangeTracker {
    slices: Vec<FrameSlice>,
}

impl SliceRangeTracker {
    pub fn new(slices: Vec<FrameSlice>) -> Self {
        Self { slices }
    }

    pub fn push(&mut self, slice: FrameSlice) {
        self.slices.push(slice);
    }

    pub fn slices(&self) -> &[FrameSlice] {
        &self.slices
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Total logical rows: the sum of row-range lengths over the first
    /// column stripe (each further stripe covers the same rows again).
    pub fn total_row_count(&self) -> usize {
        let Some(first) = self.slices.first() else {
            return 0;
        };
        let col_begin = first.cols.start;
        self.slices
            .iter()
            .filter(|s| s.cols.start == col_begin)
            .map(|s| s.rows.len())
            .sum()
    }

    /// Normalize row-range boundaries across the tracked slices.
    ///
    /// Policy: every slice keeps its own length; boundaries are restacked
    /// cumulatively in slice order, advancing the running offset by the
    /// previous slice's length each time a slice re-enters the first column
    /// stripe, so all stripes of one row block share the same start. The
    /// rewrite is deterministic, preserves the total row count exactly, and
    /// is idempotent. Returns the total row count.
    pub fn reconcile_row_counts(&mut self) -> usize {
        let Some(first) = self.slices.first() else {
            return 0;
        };
        let col_begin = first.cols.start;

        let mut offset = 0usize;
        let mut len = 0usize;
        for (i, slice) in self.slices.iter_mut().enumerate() {
            if i != 0 && slice.cols.start == col_begin {
                offset += len;
            }
            len = slice.rows.len();
            slice.rows = RowRange::new(offset, offset + len);
        }
        offset + len
    }

    /// Where the logical frame begins and how many rows it spans, for
    /// incremental/append scenarios.
    pub fn offset_and_row_count(&self) -> (usize, usize) {
        let (Some(first), Some(last)) = (self.slices.first(), self.slices.last()) else {
            return (0, 0);
        };
        let offset = first.rows.start;
        (offset, last.rows.end - offset)
    }
}

/// Drive the whole write path for one input frame: plan row slices,
/// aggregate every column of every slice into a segment, record the slices,
/// and reconcile their row ranges.
///
/// A failed column write (encoding error, allocation failure, tag misuse)
/// aborts the ingestion; the caller decides whether to retry or drop the
/// frame.
pub fn ingest_frame<'f>(
    frame: &InputFrame<'f>,
    runtime: &DecodeRuntime,
    slice_options: &SliceOptions,
    pool_options: PoolOptions,
    sparsify_floats: bool,
) -> Result<(Vec<Segment<'f>>, SliceRangeTracker)> {
    let tags: Vec<_> = frame.columns().iter().map(|c| c.tag()).collect();
    let col_count = tags.len();

    let mut segments = Vec::new();
    let mut tracker = SliceRangeTracker::default();

    for range in plan_row_slices(frame.rows(), slice_options) {
        let mut agg = SegmentAggregator::new(tags.clone(), range.len(), pool_options);
        for (col, source) in frame.columns().iter().enumerate() {
            let window = source.window(range.start, range.len())?;
            agg.set_data(col, &window, runtime, sparsify_floats)?;
        }

        let mut slice = FrameSlice::new(range, ColRange::new(0, col_count));
        slice.segment = Some(segments.len());
        segments.push(agg.finish()?);
        tracker.push(slice);
    }

    tracker.reconcile_row_counts();
    Ok((segments, tracker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(rows: (usize, usize), cols: (usize, usize)) -> FrameSlice {
        FrameSlice::new(RowRange::new(rows.0, rows.1), ColRange::new(cols.0, cols.1))
    }

    #[test]
    fn planned_slices_partition_the_frame_exactly() {
        let options = SliceOptions { rows_per_slice: 4 };
        let ranges = plan_row_slices(10, &options);

        assert_eq!(
            ranges,
            vec![
                RowRange::new(0, 4),
                RowRange::new(4, 8),
                RowRange::new(8, 10),
            ]
        );
        let covered: usize = ranges.iter().map(|r| r.len()).sum();
        assert_eq!(covered, 10);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn empty_frame_plans_one_empty_slice() {
        let ranges = plan_row_slices(0, &SliceOptions::default());
        assert_eq!(ranges, vec![RowRange::new(0, 0)]);
    }

    #[test]
    fn reconcile_restacks_tentative_boundaries() {
        // Two row blocks, two column stripes each, produced independently
        // with tentative (overlapping) row boundaries.
        let mut tracker = SliceRangeTracker::new(vec![
            slice((10, 13), (0, 2)),
            slice((10, 13), (2, 4)),
            slice((0, 2), (0, 2)),
            slice((0, 2), (2, 4)),
        ]);

        let before = tracker.total_row_count();
        let total = tracker.reconcile_row_counts();
        assert_eq!(total, 5);
        assert_eq!(before, total);

        let rows: Vec<_> = tracker.slices().iter().map(|s| s.rows).collect();
        assert_eq!(
            rows,
            vec![
                RowRange::new(0, 3),
                RowRange::new(0, 3),
                RowRange::new(3, 5),
                RowRange::new(3, 5),
            ]
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut tracker = SliceRangeTracker::new(vec![
            slice((5, 8), (0, 1)),
            slice((5, 8), (1, 2)),
            slice((9, 11), (0, 1)),
            slice((9, 11), (1, 2)),
        ]);

        let total_first = tracker.reconcile_row_counts();
        let after_first: Vec<_> = tracker.slices().to_vec();
        let total_second = tracker.reconcile_row_counts();
        let after_second: Vec<_> = tracker.slices().to_vec();

        assert_eq!(total_first, total_second);
        assert_eq!(after_first, after_second);
        assert_eq!(tracker.total_row_count(), total_second);
    }

    #[test]
    fn total_row_count_counts_one_stripe_only() {
        let tracker = SliceRangeTracker::new(vec![
            slice((0, 3), (0, 2)),
            slice((0, 3), (2, 4)),
            slice((3, 5), (0, 2)),
            slice((3, 5), (2, 4)),
        ]);
        assert_eq!(tracker.total_row_count(), 5);
    }

    #[test]
    fn offset_and_row_count_describe_appends() {
        let tracker = SliceRangeTracker::new(vec![
            slice((100, 103), (0, 1)),
            slice((103, 110), (0, 1)),
        ]);
        assert_eq!(tracker.offset_and_row_count(), (100, 10));

        let empty = SliceRangeTracker::default();
        assert_eq!(empty.offset_and_row_count(), (0, 0));
    }

    #[test]
    fn local_row_lookup_checks_the_range() {
        let s = slice((10, 20), (0, 1));
        assert_eq!(s.local_row(10).unwrap(), 0);
        assert_eq!(s.local_row(19).unwrap(), 9);
        assert!(matches!(
            s.local_row(20),
            Err(IngestError::RowOutOfSlice {
                row: 20,
                start: 10,
                end: 20,
            })
        ));
        assert!(matches!(
            s.local_row(9),
            Err(IngestError::RowOutOfSlice { .. })
        ));
    }

    #[test]
    fn first_row_offset_is_relative_to_the_frame() {
        let s = slice((100, 110), (0, 1));
        assert_eq!(s.first_row_offset(100), 0);
        assert_eq!(s.first_row_offset(90), 10);
    }
}
