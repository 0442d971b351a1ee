//! MessagePack with object-type tagging.
//!
//! objpack encodes and decodes MessagePack where every array and map carries
//! an object-type slot, so application objects can travel as ordinary
//! collections and be rebuilt on the other side.
//!
//! # Crate Structure
//!
//! - [`codec`] — Encoder, resumable decoder, extension protocol, stream drivers
//! - [`json`] — JSON bridge with tag pass-through (behind `json` feature)

/// Re-export codec types.
pub mod codec {
    pub use objpack_codec::*;
}

/// JSON bridge (requires `json` feature).
#[cfg(feature = "json")]
pub mod json;

pub use objpack_codec::{
    decode, decode_multi, encode, DecodeError, Decoder, DecoderOptions, EncodeError,
    EncoderOptions, Encoder, Envelope, ExtensionError, Map, Object, PackCtrl, UnpackCtrl, Value,
};
