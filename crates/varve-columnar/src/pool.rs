#![forbid(unsafe_code)]

use crate::buffer::ChunkedBuffer;
use crate::error::{ColumnarError, Result};
use ahash::{AHashMap, RandomState};
use std::hash::BuildHasher;

/// Raw value standing in for an explicit "no value" marker in a text slot.
const RAW_ABSENT: u64 = u64::MAX;
/// Raw value standing in for a floating not-a-number marker in a text slot.
const RAW_NOT_A_NUMBER: u64 = u64::MAX - 1;
/// Raw values at or above this are sentinels, never pool positions.
const SENTINEL_FLOOR: u64 = RAW_NOT_A_NUMBER;

/// Length prefix stored ahead of every pool record.
const LEN_PREFIX: usize = std::mem::size_of::<u32>();

/// Stable token for one interned string.
///
/// The wrapped position is private and only ever minted by
/// [`StringPool::intern`], so a `PoolOffset` can never hold one of the
/// reserved sentinel values: resolving a sentinel is a type error, not a
/// runtime check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolOffset(u64);

impl PoolOffset {
    /// The raw position, for packing into column payloads. Round-trips
    /// through [`StringEntry::to_raw`] / [`StringEntry::from_raw`].
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One slot of an interned text column: a real pool token or one of the two
/// reserved sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringEntry {
    Str(PoolOffset),
    /// The source row held an explicit "no value" marker.
    Absent,
    /// The source row held a floating not-a-number marker in a text slot.
    NotANumber,
}

impl StringEntry {
    /// Packed representation stored in column payloads.
    pub fn to_raw(self) -> u64 {
        match self {
            StringEntry::Str(offset) => offset.0,
            StringEntry::Absent => RAW_ABSENT,
            StringEntry::NotANumber => RAW_NOT_A_NUMBER,
        }
    }

    /// Classify a packed value. Raw values below the sentinel floor become
    /// pool tokens; whether they address real content is decided by
    /// [`StringPool::resolve`].
    pub fn from_raw(raw: u64) -> StringEntry {
        match raw {
            RAW_ABSENT => StringEntry::Absent,
            RAW_NOT_A_NUMBER => StringEntry::NotANumber,
            pos => StringEntry::Str(PoolOffset(pos)),
        }
    }

    pub fn is_sentinel(self) -> bool {
        !matches!(self, StringEntry::Str(_))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    /// Capacity of each storage block. Strings never span blocks, so this is
    /// also a soft lower bound on the largest string stored without a
    /// dedicated block.
    pub block_bytes: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { block_bytes: 4096 }
    }
}

/// Deduplicating string interner over chunked storage.
///
/// Records are `[len: u32 LE][bytes]`, appended only; a content-addressed
/// index maps string bytes to the position of their first occurrence, so
/// interning equal content always returns the same token.
pub struct StringPool {
    data: ChunkedBuffer,
    /// Content hash -> record positions with that hash, byte-equality
    /// confirmed against storage on lookup.
    index: AHashMap<u64, Vec<PoolOffset>>,
    /// Record start positions in append order (strictly increasing), used to
    /// validate tokens that arrive through [`StringEntry::from_raw`].
    starts: Vec<u64>,
    hasher: RandomState,
}

impl std::fmt::Debug for StringPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringPool")
            .field("unique_count", &self.starts.len())
            .field("stored_bytes", &self.data.len())
            .finish()
    }
}

impl StringPool {
    pub fn new(options: PoolOptions) -> Self {
        Self {
            data: ChunkedBuffer::with_block_capacity(options.block_bytes),
            index: AHashMap::new(),
            starts: Vec::new(),
            hasher: RandomState::new(),
        }
    }

    /// Number of distinct strings stored.
    pub fn unique_count(&self) -> usize {
        self.starts.len()
    }

    /// Intern `bytes`, returning the existing token when byte-identical
    /// content is already stored and a fresh one otherwise.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<PoolOffset> {
        let hash = self.hasher.hash_one(bytes);
        if let Some(candidates) = self.index.get(&hash) {
            for &offset in candidates {
                if self.record_bytes(offset)? == bytes {
                    return Ok(offset);
                }
            }
        }

        let len = u32::try_from(bytes.len())
            .map_err(|_| ColumnarError::StringTooLarge { len: bytes.len() })?;
        let pos = self.data.push_record(&[&len.to_le_bytes(), bytes])?;
        if pos >= SENTINEL_FLOOR {
            return Err(ColumnarError::PoolOffsetSpaceExhausted);
        }

        let offset = PoolOffset(pos);
        self.index.entry(hash).or_default().push(offset);
        self.starts.push(pos);
        Ok(offset)
    }

    /// Content of an interned string. Fails when the token does not address
    /// a record start (possible only for tokens fabricated from packed
    /// payloads, not for tokens returned by [`StringPool::intern`]).
    pub fn resolve(&self, offset: PoolOffset) -> Result<&[u8]> {
        if self.starts.binary_search(&offset.0).is_err() {
            return Err(ColumnarError::OffsetOutOfBounds {
                pos: offset.0,
                len: 0,
                buffer_len: self.data.len(),
            });
        }
        self.record_bytes(offset)
    }

    fn record_bytes(&self, offset: PoolOffset) -> Result<&[u8]> {
        let prefix = self.data.bytes_at(offset.0, LEN_PREFIX)?;
        let len = u32::from_le_bytes(prefix.try_into().expect("prefix is 4 bytes")) as usize;
        self.data.bytes_at(offset.0 + LEN_PREFIX as u64, len)
    }
}
