//! MessagePack codec with object-type tagging and a resumable streaming decoder.
//!
//! Every array and map on the wire carries one leading object-type slot that
//! is not counted in its header. Plain collections write nil there; tagged
//! collections are produced and consumed by application hooks
//! ([`PackCtrl`], [`UnpackCtrl`]), which lets application objects travel as
//! ordinary MessagePack.
//!
//! Decoding is a resumable state machine: input may be split at any byte
//! boundary and fed in pieces, synchronously ([`Decoder::decode_multi`],
//! [`ValueReader`]) or from an async chunk source
//! ([`Decoder::decode_async`], [`Decoder::decode_array_stream`],
//! [`Decoder::decode_multi_stream`]).

#[cfg(feature = "async")]
pub mod codec;
pub mod config;
mod cursor;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod ext;
pub mod reader;
mod reentry;
pub mod sink;
pub mod stream;
pub mod value;
pub mod wire;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::ObjpackCodec;
pub use config::{
    DecoderOptions, EncoderOptions, MapKeyConverter, DEFAULT_INITIAL_BUFFER_SIZE,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_LENGTH,
};
pub use decoder::{
    decode, decode_array_stream, decode_async, decode_multi, decode_multi_stream, DecodeMulti,
    Decoder,
};
pub use encoder::{encode, Encoder};
pub use error::{DecodeError, EncodeError, ExtensionError, Result};
pub use ext::{plain_pack, plain_unpack, Envelope, PackCtrl, Plain, UnpackCtrl};
pub use reader::ValueReader;
pub use stream::{ArrayStream, MultiStream};
pub use value::{Map, Object, Value};
pub use wire::LengthKind;
pub use writer::ValueWriter;
