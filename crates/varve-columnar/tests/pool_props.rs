use proptest::prelude::*;
use varve_columnar::{PoolOptions, StringEntry, StringPool};

proptest! {
    /// Interned content resolves back byte-for-byte, and interning the same
    /// bytes twice yields the same token.
    #[test]
    fn intern_resolve_round_trip(strings in proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 0..64),
        1..32,
    )) {
        let mut pool = StringPool::new(PoolOptions { block_bytes: 64 });
        let mut offsets = Vec::with_capacity(strings.len());
        for s in &strings {
            offsets.push(pool.intern(s).unwrap());
        }
        for (s, offset) in strings.iter().zip(&offsets) {
            prop_assert_eq!(pool.resolve(*offset).unwrap(), s.as_slice());
            prop_assert_eq!(pool.intern(s).unwrap(), *offset);
        }
    }

    /// No interned token ever packs to either reserved sentinel, and the
    /// packed form classifies back to the same token.
    #[test]
    fn tokens_stay_disjoint_from_sentinels(strings in proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 0..32),
        1..64,
    )) {
        let mut pool = StringPool::new(PoolOptions::default());
        for s in &strings {
            let offset = pool.intern(s).unwrap();
            let raw = offset.raw();
            prop_assert_ne!(raw, StringEntry::Absent.to_raw());
            prop_assert_ne!(raw, StringEntry::NotANumber.to_raw());
            prop_assert_eq!(StringEntry::from_raw(raw), StringEntry::Str(offset));
        }
    }
}
