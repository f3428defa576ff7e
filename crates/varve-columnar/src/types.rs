#![forbid(unsafe_code)]

use std::fmt;

/// Physical storage kind of a column.
///
/// This is a closed set: the write-path dispatch matches over it without a
/// wildcard arm, so adding a tag here forces every dispatch site to grow a
/// branch at compile time. [`DataType::ALL`] enumerates the set for the
/// coverage checks in tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    /// Fixed-width character slots. The slot width is a property of the
    /// source view, not the tag; slots are stored verbatim, undeduplicated.
    FixedStr,
    /// Variable-length text, validated as UTF-8 and interned in the
    /// segment's string pool.
    Utf8Str,
    /// Variable-length byte strings, interned without validation.
    BytesStr,
    /// Declared type with no physical storage.
    Empty,
}

impl DataType {
    /// Every tag, in declaration order.
    pub const ALL: [DataType; 15] = [
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::Bool,
        DataType::FixedStr,
        DataType::Utf8Str,
        DataType::BytesStr,
        DataType::Empty,
    ];

    /// Fixed per-element payload width in bytes.
    ///
    /// `None` for tags whose width is not a property of the tag itself:
    /// fixed-width strings take their slot width from the source view,
    /// variable-length strings store pool entries rather than raw payload,
    /// and `Empty` has no storage at all.
    pub fn width(self) -> Option<usize> {
        match self {
            DataType::UInt8 | DataType::Int8 | DataType::Bool => Some(1),
            DataType::UInt16 | DataType::Int16 => Some(2),
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => Some(4),
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => Some(8),
            DataType::FixedStr | DataType::Utf8Str | DataType::BytesStr | DataType::Empty => None,
        }
    }

    /// Integer or floating-point.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
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
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// String-like tags (fixed slots or interned variable-length content).
    pub fn is_sequence(self) -> bool {
        matches!(
            self,
            DataType::FixedStr | DataType::Utf8Str | DataType::BytesStr
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::FixedStr => "fixed_str",
            DataType::Utf8Str => "utf8_str",
            DataType::BytesStr => "bytes_str",
            DataType::Empty => "empty",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_table_covers_every_tag() {
        // A wildcard-free match over each entry: adding a variant without
        // extending ALL fails to compile here.
        for tag in DataType::ALL {
            match tag {
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
                | DataType::Bool
                | DataType::FixedStr
                | DataType::Utf8Str
                | DataType::BytesStr
                | DataType::Empty => {}
            }
        }
        assert_eq!(DataType::ALL.len(), 15);
    }

    #[test]
    fn widths_match_categories() {
        for tag in DataType::ALL {
            match tag.width() {
                Some(w) => {
                    assert!(tag.is_numeric() || tag == DataType::Bool);
                    assert!(matches!(w, 1 | 2 | 4 | 8));
                }
                None => assert!(tag.is_sequence() || tag == DataType::Empty),
            }
        }
    }
}
