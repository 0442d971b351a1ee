use crate::wire::{self, LengthKind};

/// Errors raised by extension hooks.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The encode hook cannot represent this application object.
    #[error("unrecognized object: {0}")]
    UnrecognizedObject(&'static str),

    /// The decode hook does not know this object-type tag.
    #[error("unrecognized object type {0}")]
    UnrecognizedType(String),

    /// The tag is known but the payload does not fit it.
    #[error("invalid object payload: {0}")]
    Invalid(String),
}

/// Errors that can occur while encoding a value.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The value nests deeper than `max_depth` (or refers back to itself).
    #[error("too deep objects in depth {depth}")]
    DepthExceeded { depth: usize },

    /// A string, binary, array or map is too long for a 32-bit length.
    #[error("too large {kind}: {size}")]
    TooLarge { kind: LengthKind, size: usize },

    /// The extension hook refused the value.
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// The underlying writer failed.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input ended in the middle of a value.
    #[error("insufficient data at offset {offset}")]
    Insufficient { offset: usize },

    /// A complete value was decoded but unconsumed bytes remain.
    #[error("extra {extra} of {total} byte(s) found at buffer[{offset}]")]
    ExtraBytes {
        extra: usize,
        total: usize,
        offset: usize,
    },

    /// The tag byte is not assigned by the wire format.
    #[error("unrecognized type byte: {byte:#04x} at offset {offset}")]
    UnrecognizedByte { byte: u8, offset: usize },

    /// A map key is not a string and no key converter accepted it.
    #[error("the type of key must be string but got {found} at offset {offset}")]
    InvalidKeyType { found: &'static str, offset: usize },

    /// A map key would shadow object internals in dynamic hosts.
    #[error("the key __proto__ is not allowed (offset {offset})")]
    ForbiddenKey { offset: usize },

    /// A declared length is over the configured maximum.
    #[error("max length exceeded: {kind} ({length}) > max ({max}) at offset {offset}")]
    MaxLengthExceeded {
        kind: LengthKind,
        length: usize,
        max: usize,
        offset: usize,
    },

    /// Values nest deeper than `max_depth`.
    #[error("too deep objects in depth {depth} at offset {offset}")]
    DepthExceeded { depth: usize, offset: usize },

    /// A string payload is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// An array stream was requested but the input starts with another type.
    #[error("unrecognized array type byte: {byte:#04x} ({}) at offset {offset}", byte_type(.byte))]
    NotAnArray { byte: u8, offset: usize },

    /// An array stream was requested over a tagged application object.
    #[error("cannot stream the elements of a tagged object (offset {offset})")]
    TaggedArrayStream { offset: usize },

    /// The extension hook refused a tagged array or map.
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// The chunk source failed.
    #[error("chunk source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns true for the range-related kind: the input is incomplete or
    /// has bytes left over. Only the caller can supply more bytes or decide
    /// that incompleteness is expected.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            DecodeError::Insufficient { .. } | DecodeError::ExtraBytes { .. }
        )
    }
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

fn byte_type(byte: &u8) -> &'static str {
    wire::type_name(*byte)
}
