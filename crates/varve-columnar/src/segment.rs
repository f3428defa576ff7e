#![forbid(unsafe_code)]

use crate::column::Column;
use crate::pool::StringPool;
use crate::types::DataType;
use std::sync::Arc;

/// A row-aligned group of columns sharing one string pool: the unit the
/// write path produces per physical slice of a logical frame.
///
/// The lifetime `'f` is the source frame's validity window. A segment whose
/// columns include a zero-copy payload borrows caller memory until it is
/// converted or persisted; [`SegmentDescriptor::borrows_external`] surfaces
/// that fact to the metadata layer.
#[derive(Debug)]
pub struct Segment<'f> {
    rows: usize,
    columns: Vec<Column<'f>>,
    pool: Arc<StringPool>,
}

/// The narrow contract consumed by the external descriptor/metadata builder:
/// row count, per-column tags, and whether caller memory is still borrowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub rows: usize,
    pub column_tags: Vec<DataType>,
    pub borrows_external: bool,
}

impl<'f> Segment<'f> {
    pub fn new(rows: usize, columns: Vec<Column<'f>>, pool: Arc<StringPool>) -> Self {
        debug_assert!(
            columns.iter().all(|c| c.rows() == rows),
            "segment columns must cover the same row range"
        );
        Self {
            rows,
            columns,
            pool,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column<'f>> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column<'f>] {
        &self.columns
    }

    /// The pool shared by this segment's interned text columns.
    pub fn string_pool(&self) -> &Arc<StringPool> {
        &self.pool
    }

    pub fn descriptor(&self) -> SegmentDescriptor {
        SegmentDescriptor {
            rows: self.rows,
            column_tags: self.columns.iter().map(|c| c.tag()).collect(),
            borrows_external: self.columns.iter().any(|c| c.is_borrowed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnData;
    use crate::pool::PoolOptions;

    #[test]
    fn descriptor_reports_borrowed_memory() {
        let raw = [0u8; 16];
        let borrowed = Column::new(DataType::UInt64, 2, ColumnData::Borrowed(&raw));
        let empty = Column::new(DataType::Empty, 2, ColumnData::Empty);
        let pool = Arc::new(StringPool::new(PoolOptions::default()));

        let segment = Segment::new(2, vec![borrowed, empty], pool);
        let descriptor = segment.descriptor();

        assert_eq!(descriptor.rows, 2);
        assert_eq!(
            descriptor.column_tags,
            vec![DataType::UInt64, DataType::Empty]
        );
        assert!(descriptor.borrows_external);
    }
}
