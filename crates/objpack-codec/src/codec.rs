//! `tokio-util` codec adapter, for use with `FramedRead` / `FramedWrite`.

use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::cursor::{DecodeConfig, DecodeState, TOP_LEVEL_DEPTH};
use crate::encoder::Encoder;
use crate::error::{DecodeError, EncodeError};
use crate::ext::{PackCtrl, UnpackCtrl};
use crate::value::Value;

/// Frames a byte stream as back-to-back values.
///
/// Decoding is resumable: a value split over several reads is never
/// re-parsed from its start.
pub struct ObjpackCodec {
    encoder: Encoder,
    config: Arc<DecodeConfig>,
    state: DecodeState,
}

impl ObjpackCodec {
    pub fn new<P, U>(pack: P, unpack: U) -> Self
    where
        P: PackCtrl + 'static,
        U: UnpackCtrl + 'static,
    {
        Self {
            encoder: Encoder::new(pack),
            config: Arc::new(DecodeConfig {
                options: unpack.options(),
                ctrl: Arc::new(unpack),
            }),
            state: DecodeState::new(TOP_LEVEL_DEPTH),
        }
    }
}

impl tokio_util::codec::Decoder for ObjpackCodec {
    type Item = Value;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, DecodeError> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.state.advance(src, &self.config) {
            Ok(step) => {
                src.advance(step.consumed);
                Ok(step.value)
            }
            Err(err) => {
                // A stream cannot be resynchronised after a rejected value.
                src.clear();
                self.state.reset(TOP_LEVEL_DEPTH);
                Err(err)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Value>, DecodeError> {
        match self.decode(src)? {
            Some(value) => Ok(Some(value)),
            None if src.is_empty() && self.state.is_idle() => Ok(None),
            None => Err(DecodeError::Insufficient {
                offset: self.state.offset() + src.len(),
            }),
        }
    }
}

impl tokio_util::codec::Encoder<Value> for ObjpackCodec {
    type Error = EncodeError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), EncodeError> {
        let bytes = self.encoder.encode_shared_ref(&item)?;
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::ext::{plain_pack, plain_unpack};

    fn codec() -> ObjpackCodec {
        ObjpackCodec::new(plain_pack(), plain_unpack())
    }

    #[tokio::test]
    async fn framed_round_trip() {
        let mut framed = FramedWrite::new(Vec::new(), codec());
        framed.send(Value::from("hello")).await.unwrap();
        framed
            .send(Value::Array(vec![Value::from(1), Value::Nil]))
            .await
            .unwrap();
        let wire = framed.into_inner();

        let values: Vec<Value> = FramedRead::new(wire.as_slice(), codec())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            values,
            vec![
                Value::from("hello"),
                Value::Array(vec![Value::Int(1), Value::Nil])
            ]
        );
    }

    #[tokio::test]
    async fn truncated_stream_fails_at_eof() {
        let wire: &[u8] = &[0x01, 0x92, 0xc0];
        let results: Vec<Result<Value, DecodeError>> =
            FramedRead::new(wire, codec()).collect().await;
        assert!(matches!(results[0], Ok(Value::Int(1))));
        assert!(matches!(results[1], Err(DecodeError::Insufficient { offset: 3 })));
    }

    #[test]
    fn decoding_restarts_after_an_error() {
        use tokio_util::codec::Decoder as _;

        let mut codec = codec();
        let mut src = BytesMut::from(&[0x91, 0xa1, b't', 0x01, 0xc3][..]);
        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Extension(crate::error::ExtensionError::UnrecognizedType(_))
        ));
        assert!(src.is_empty());
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(&[0x91, 0xc0, 0x07]);
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Value::Array(vec![Value::Int(7)]))
        );
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
    }
}
