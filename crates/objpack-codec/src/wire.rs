//! MessagePack type tags.
//!
//! Every encoded value starts with one tag byte. Small integers and the
//! lengths of short strings, arrays and maps are embedded in the tag itself;
//! every other tag is followed by a big-endian length and/or payload.

use std::fmt;

/// nil.
pub const NIL: u8 = 0xc0;

/// Boolean false.
pub const FALSE: u8 = 0xc2;

/// Boolean true.
pub const TRUE: u8 = 0xc3;

pub const BIN8: u8 = 0xc4;
pub const BIN16: u8 = 0xc5;
pub const BIN32: u8 = 0xc6;

pub const FLOAT32: u8 = 0xca;
pub const FLOAT64: u8 = 0xcb;

pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;

pub const INT8: u8 = 0xd0;
pub const INT16: u8 = 0xd1;
pub const INT32: u8 = 0xd2;
pub const INT64: u8 = 0xd3;

pub const STR8: u8 = 0xd9;
pub const STR16: u8 = 0xda;
pub const STR32: u8 = 0xdb;

pub const ARRAY16: u8 = 0xdc;
pub const ARRAY32: u8 = 0xdd;

pub const MAP16: u8 = 0xde;
pub const MAP32: u8 = 0xdf;

/// fixmap base: `0x80 + len` for `len < 16`.
pub const FIXMAP: u8 = 0x80;

/// fixarray base: `0x90 + len` for `len < 16`.
pub const FIXARRAY: u8 = 0x90;

/// fixstr base: `0xa0 + len` for `len < 32`.
pub const FIXSTR: u8 = 0xa0;

/// First negative fixint tag (-32).
pub const NEGATIVE_FIXINT: u8 = 0xe0;

/// Largest length that fits in a fixstr tag.
pub const FIXSTR_MAX_LEN: usize = 31;

/// Largest length that fits in a fixarray or fixmap tag.
pub const FIXCOLLECTION_MAX_LEN: usize = 15;

/// Lengths at or above this bound cannot be written.
pub const MAX_LENGTH: u64 = 1 << 32;

/// The length-prefixed shapes, used by length guards and size errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthKind {
    Str,
    Bin,
    Array,
    Map,
}

impl fmt::Display for LengthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LengthKind::Str => "UTF-8 byte length",
            LengthKind::Bin => "binary length",
            LengthKind::Array => "array length",
            LengthKind::Map => "map length",
        };
        f.write_str(name)
    }
}

/// Returns a human-readable name for the value a tag byte introduces.
/// Bytes the decoder rejects (0xc1 and the extension tags) are "unassigned".
pub fn type_name(byte: u8) -> &'static str {
    match byte {
        0x00..=0x7f | 0xe0..=0xff => "int",
        0x80..=0x8f | MAP16 | MAP32 => "map",
        0x90..=0x9f | ARRAY16 | ARRAY32 => "array",
        0xa0..=0xbf | STR8 | STR16 | STR32 => "str",
        NIL => "nil",
        FALSE | TRUE => "bool",
        BIN8 | BIN16 | BIN32 => "bin",
        FLOAT32 | FLOAT64 => "float",
        UINT8..=INT64 => "int",
        _ => "unassigned",
    }
}

/// Returns true if the byte opens an array.
pub fn is_array_head(byte: u8) -> bool {
    matches!(byte, 0x90..=0x9f | ARRAY16 | ARRAY32)
}
