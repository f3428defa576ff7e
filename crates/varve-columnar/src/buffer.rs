#![forbid(unsafe_code)]

use crate::error::{ColumnarError, Result};

/// Growable, possibly-segmented byte store.
///
/// Two usage modes, fixed at construction:
/// - [`ChunkedBuffer::presized`]: exactly one block of a known size, used for
///   column payloads. The block is never reallocated, so slices into it stay
///   valid for the buffer's lifetime and the write path can fill it in place.
/// - [`ChunkedBuffer::with_block_capacity`]: growable record storage used by
///   the string pool. Records are appended with [`ChunkedBuffer::push_record`]
///   and never span a block boundary, so every record can be read back as one
///   contiguous slice at a stable logical position.
#[derive(Debug, Default)]
pub struct ChunkedBuffer {
    blocks: Vec<Block>,
    /// Capacity for newly opened blocks; a block always holds at least one
    /// whole record, so oversized records get a block of their own.
    block_bytes: usize,
}

#[derive(Debug)]
struct Block {
    /// Logical position of this block's first byte.
    start: u64,
    data: Vec<u8>,
}

impl ChunkedBuffer {
    /// A buffer holding exactly `byte_size` contiguous zeroed bytes.
    pub fn presized(byte_size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(byte_size)
            .map_err(|_| ColumnarError::AllocationFailure { bytes: byte_size })?;
        data.resize(byte_size, 0);
        Ok(Self {
            blocks: vec![Block { start: 0, data }],
            block_bytes: 0,
        })
    }

    /// An empty growable buffer that opens `block_bytes`-sized blocks as
    /// records are appended.
    pub fn with_block_capacity(block_bytes: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_bytes: block_bytes.max(1),
        }
    }

    /// Total stored bytes.
    pub fn len(&self) -> u64 {
        self.blocks
            .last()
            .map(|b| b.start + b.data.len() as u64)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Contiguous view of a presized buffer.
    ///
    /// Panics if the buffer has grown into multiple blocks; only presized
    /// buffers are read this way.
    pub fn as_slice(&self) -> &[u8] {
        match self.blocks.len() {
            0 => &[],
            1 => &self.blocks[0].data,
            n => panic!("contiguous view requested from a buffer of {n} blocks"),
        }
    }

    /// Mutable contiguous view of a presized buffer. Same contract as
    /// [`ChunkedBuffer::as_slice`].
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.blocks.len() {
            0 => &mut [],
            1 => &mut self.blocks[0].data,
            n => panic!("contiguous view requested from a buffer of {n} blocks"),
        }
    }

    /// Append one record assembled from `parts`, returning its stable
    /// logical position. The record is stored contiguously: if it does not
    /// fit in the current block's remaining capacity, a fresh block is
    /// opened and the old block is sealed at its current length.
    pub fn push_record(&mut self, parts: &[&[u8]]) -> Result<u64> {
        let total: usize = parts.iter().map(|p| p.len()).sum();

        let needs_block = match self.blocks.last() {
            Some(block) => block.data.capacity() - block.data.len() < total,
            None => true,
        };
        if needs_block {
            let capacity = self.block_bytes.max(total);
            let mut data = Vec::new();
            data.try_reserve_exact(capacity)
                .map_err(|_| ColumnarError::AllocationFailure { bytes: capacity })?;
            let start = self.len();
            self.blocks.push(Block { start, data });
        }

        let block = self.blocks.last_mut().expect("block opened above");
        let pos = block.start + block.data.len() as u64;
        for part in parts {
            block.data.extend_from_slice(part);
        }
        Ok(pos)
    }

    /// Contiguous read of `len` bytes at logical position `pos`. Fails when
    /// the range does not address stored content (including ranges that
    /// would cross a block boundary, which no stored record does).
    pub fn bytes_at(&self, pos: u64, len: usize) -> Result<&[u8]> {
        let out_of_bounds = || ColumnarError::OffsetOutOfBounds {
            pos,
            len,
            buffer_len: self.len(),
        };

        let idx = self
            .blocks
            .partition_point(|b| b.start <= pos)
            .checked_sub(1)
            .ok_or_else(out_of_bounds)?;
        let block = &self.blocks[idx];
        let offset = (pos - block.start) as usize;
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > block.data.len() {
            return Err(out_of_bounds());
        }
        Ok(&block.data[offset..end])
    }
}
