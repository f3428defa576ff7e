#![forbid(unsafe_code)]

use crate::buffer::ChunkedBuffer;
use crate::error::{ColumnarError, Result};
use crate::pool::{StringEntry, StringPool};
use crate::presence::PresenceMap;
use crate::types::DataType;
use std::sync::Arc;

/// Physical payload of one column.
///
/// Ownership is visible in the type: a `Borrowed` payload references memory
/// owned by the caller's input frame and is only valid for the frame
/// lifetime `'f`, while every other variant owns its storage outright. A
/// segment holding any `Borrowed` column therefore cannot outlive the
/// caller's validity guarantee without failing to compile.
#[derive(Debug)]
pub enum ColumnData<'f> {
    /// Zero-copy reference to C-style-contiguous external memory.
    Borrowed(&'f [u8]),
    /// Owned fixed-width payload, produced by copy-flattening a strided
    /// source.
    Owned(ChunkedBuffer),
    /// Packed [`StringEntry`] tokens into the segment's string pool, one
    /// `u64` per row.
    Strings(ChunkedBuffer),
    /// Fixed-width character slots, stored verbatim (not deduplicated).
    FixedStrings { buf: ChunkedBuffer, slot: usize },
    /// Sparse floating payload: dense non-missing values plus a presence
    /// bitmap; not-a-number entries are omitted from the dense values.
    Sparse {
        values: ChunkedBuffer,
        presence: PresenceMap,
    },
    /// No physical storage.
    Empty,
}

/// One typed column of a segment. The type tag is fixed for the column's
/// lifetime.
#[derive(Debug)]
pub struct Column<'f> {
    tag: DataType,
    rows: usize,
    data: ColumnData<'f>,
    /// Shared handle on the owning segment's pool; present on interned text
    /// columns once the segment is sealed.
    pool: Option<Arc<StringPool>>,
}

impl<'f> Column<'f> {
    /// Used by the write path; columns are not built directly by readers.
    pub fn new(tag: DataType, rows: usize, data: ColumnData<'f>) -> Self {
        Self {
            tag,
            rows,
            data,
            pool: None,
        }
    }

    /// Attach the owning segment's string pool to an interned text column.
    pub fn attach_pool(&mut self, pool: Arc<StringPool>) {
        debug_assert!(
            matches!(self.data, ColumnData::Strings(_)),
            "pool attached to a non-interned column"
        );
        self.pool = Some(pool);
    }

    pub fn tag(&self) -> DataType {
        self.tag
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn data(&self) -> &ColumnData<'f> {
        &self.data
    }

    pub fn pool(&self) -> Option<&Arc<StringPool>> {
        self.pool.as_ref()
    }

    /// Whether this column still references caller-owned memory.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, ColumnData::Borrowed(_))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(ColumnarError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }
        Ok(())
    }

    fn mismatch(&self, requested: &'static str) -> ColumnarError {
        ColumnarError::TypeMismatch {
            requested,
            actual: self.tag,
        }
    }

    /// Dense fixed-width payload bytes (borrowed or owned).
    fn dense_bytes(&self, requested: &'static str) -> Result<&[u8]> {
        match &self.data {
            ColumnData::Borrowed(bytes) => Ok(bytes),
            ColumnData::Owned(buf) => Ok(buf.as_slice()),
            _ => Err(self.mismatch(requested)),
        }
    }

    /// Raw little-endian bytes of one dense value.
    pub fn row_bytes(&self, row: usize) -> Result<&[u8]> {
        self.check_row(row)?;
        let width = self.tag.width().ok_or_else(|| self.mismatch("fixed-width"))?;
        let bytes = self.dense_bytes("fixed-width")?;
        Ok(&bytes[row * width..(row + 1) * width])
    }

    /// Unsigned integer or boolean value.
    pub fn value_u64(&self, row: usize) -> Result<u64> {
        let bytes = self.row_bytes(row)?;
        match self.tag {
            DataType::UInt8 | DataType::Bool => Ok(bytes[0] as u64),
            DataType::UInt16 => Ok(u16::from_le_bytes(bytes.try_into().expect("width 2")) as u64),
            DataType::UInt32 => Ok(u32::from_le_bytes(bytes.try_into().expect("width 4")) as u64),
            DataType::UInt64 => Ok(u64::from_le_bytes(bytes.try_into().expect("width 8"))),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    /// Signed integer value.
    pub fn value_i64(&self, row: usize) -> Result<i64> {
        let bytes = self.row_bytes(row)?;
        match self.tag {
            DataType::Int8 => Ok(i8::from_le_bytes(bytes.try_into().expect("width 1")) as i64),
            DataType::Int16 => Ok(i16::from_le_bytes(bytes.try_into().expect("width 2")) as i64),
            DataType::Int32 => Ok(i32::from_le_bytes(bytes.try_into().expect("width 4")) as i64),
            DataType::Int64 => Ok(i64::from_le_bytes(bytes.try_into().expect("width 8"))),
            _ => Err(self.mismatch("signed integer")),
        }
    }

    /// Dense floating value (`f32` widened to `f64`).
    pub fn value_f64(&self, row: usize) -> Result<f64> {
        let bytes = self.row_bytes(row)?;
        match self.tag {
            DataType::Float32 => Ok(f32::from_le_bytes(bytes.try_into().expect("width 4")) as f64),
            DataType::Float64 => Ok(f64::from_le_bytes(bytes.try_into().expect("width 8"))),
            _ => Err(self.mismatch("floating-point")),
        }
    }

    /// Sparse floating value; `None` for rows whose source value was
    /// not-a-number and was omitted from the dense payload.
    pub fn sparse_f64(&self, row: usize) -> Result<Option<f64>> {
        self.check_row(row)?;
        let (values, presence) = match &self.data {
            ColumnData::Sparse { values, presence } => (values, presence),
            _ => return Err(self.mismatch("sparse floating-point")),
        };
        let Some(dense) = presence.dense_index(row) else {
            return Ok(None);
        };
        let bytes = values.as_slice();
        let value = match self.tag {
            DataType::Float32 => {
                f32::from_le_bytes(bytes[dense * 4..dense * 4 + 4].try_into().expect("width 4"))
                    as f64
            }
            DataType::Float64 => {
                f64::from_le_bytes(bytes[dense * 8..dense * 8 + 8].try_into().expect("width 8"))
            }
            _ => return Err(self.mismatch("sparse floating-point")),
        };
        Ok(Some(value))
    }

    /// Packed string-pool entry of one row of an interned text column.
    pub fn string_entry(&self, row: usize) -> Result<StringEntry> {
        self.check_row(row)?;
        let buf = match &self.data {
            ColumnData::Strings(buf) => buf,
            _ => return Err(self.mismatch("interned string")),
        };
        let bytes = buf.as_slice();
        let raw = u64::from_le_bytes(
            bytes[row * 8..(row + 1) * 8]
                .try_into()
                .expect("entries are 8 bytes"),
        );
        Ok(StringEntry::from_raw(raw))
    }

    /// One fixed-width character slot, including any trailing padding.
    pub fn fixed_str(&self, row: usize) -> Result<&[u8]> {
        self.check_row(row)?;
        let (buf, slot) = match &self.data {
            ColumnData::FixedStrings { buf, slot } => (buf, *slot),
            _ => return Err(self.mismatch("fixed-width string")),
        };
        let bytes = buf.as_slice();
        Ok(&bytes[row * slot..(row + 1) * slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_from(bytes: &[u8]) -> ChunkedBuffer {
        let mut buf = ChunkedBuffer::presized(bytes.len()).unwrap();
        buf.as_mut_slice().copy_from_slice(bytes);
        buf
    }

    #[test]
    fn borrowed_and_owned_read_identically() {
        let raw: Vec<u8> = [1.5f64, -2.0, 0.25]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let borrowed = Column::new(DataType::Float64, 3, ColumnData::Borrowed(&raw));
        let owned = Column::new(DataType::Float64, 3, ColumnData::Owned(owned_from(&raw)));

        assert!(borrowed.is_borrowed());
        assert!(!owned.is_borrowed());
        for row in 0..3 {
            assert_eq!(
                borrowed.value_f64(row).unwrap(),
                owned.value_f64(row).unwrap()
            );
        }
    }

    #[test]
    fn typed_readers_reject_wrong_tags() {
        let raw = 7u32.to_le_bytes();
        let column = Column::new(DataType::UInt32, 1, ColumnData::Borrowed(&raw));

        assert_eq!(column.value_u64(0).unwrap(), 7);
        assert!(matches!(
            column.value_f64(0),
            Err(ColumnarError::TypeMismatch { .. })
        ));
        assert!(matches!(
            column.string_entry(0),
            Err(ColumnarError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn row_bounds_are_checked() {
        let raw = [0u8; 8];
        let column = Column::new(DataType::Int64, 1, ColumnData::Borrowed(&raw));
        assert!(matches!(
            column.value_i64(1),
            Err(ColumnarError::RowOutOfBounds { row: 1, rows: 1 })
        ));
    }

    #[test]
    fn sparse_reads_follow_presence() {
        let mut presence = PresenceMap::new();
        for p in [true, false, true] {
            presence.push(p);
        }
        let dense: Vec<u8> = [10.0f64, 30.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let column = Column::new(
            DataType::Float64,
            3,
            ColumnData::Sparse {
                values: owned_from(&dense),
                presence,
            },
        );

        assert_eq!(column.sparse_f64(0).unwrap(), Some(10.0));
        assert_eq!(column.sparse_f64(1).unwrap(), None);
        assert_eq!(column.sparse_f64(2).unwrap(), Some(30.0));
    }
}
