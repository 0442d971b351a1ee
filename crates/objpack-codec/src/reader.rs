use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::cursor::{DecodeConfig, DecodeState, TOP_LEVEL_DEPTH};
use crate::error::{DecodeError, Result};
use crate::ext::UnpackCtrl;
use crate::value::Value;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads consecutive values from any blocking `Read` stream.
///
/// Handles partial reads internally; callers always get complete values.
pub struct ValueReader<T> {
    inner: T,
    buf: BytesMut,
    state: DecodeState,
    config: Arc<DecodeConfig>,
    failed: bool,
}

impl<T: Read> ValueReader<T> {
    /// Create a value reader decoding with `ctrl`.
    pub fn new<C: UnpackCtrl + 'static>(inner: T, ctrl: C) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: DecodeState::new(TOP_LEVEL_DEPTH),
            config: Arc::new(DecodeConfig {
                options: ctrl.options(),
                ctrl: Arc::new(ctrl),
            }),
            failed: false,
        }
    }

    /// Read the next complete value (blocking).
    ///
    /// Returns `Ok(None)` when EOF falls between values and
    /// [`DecodeError::Insufficient`] when it falls inside one. After the
    /// first error the reader is exhausted and only returns `Ok(None)`.
    pub fn read_value(&mut self) -> Result<Option<Value>> {
        if self.failed {
            return Ok(None);
        }
        let result = self.next_value();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn next_value(&mut self) -> Result<Option<Value>> {
        loop {
            if !self.buf.is_empty() {
                let step = self.state.advance(&self.buf, &self.config)?;
                self.buf.advance(step.consumed);
                if let Some(value) = step.value {
                    return Ok(Some(value));
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(DecodeError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() && self.state.is_idle() {
                    return Ok(None);
                }
                return Err(DecodeError::Insufficient {
                    offset: self.state.offset() + self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for ValueReader<T> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_value().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::ExtensionError;
    use crate::ext::plain_unpack;

    /// Hands out at most `step` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn reads_consecutive_values() {
        let wire = vec![0x01, 0x92, 0xc0, 0xa1, b'a', 0xc2];
        let mut reader = ValueReader::new(Cursor::new(wire), plain_unpack());

        assert_eq!(reader.read_value().unwrap(), Some(Value::Int(1)));
        assert_eq!(
            reader.read_value().unwrap(),
            Some(Value::Array(vec![Value::from("a"), Value::Bool(false)]))
        );
        assert_eq!(reader.read_value().unwrap(), None);
    }

    #[test]
    fn partial_reads_reassemble() {
        let data = vec![0x82, 0xc0, 0xa1, b'x', 0xcd, 0x01, 0x00, 0xa1, b'y', 0xc0];
        let reader = ValueReader::new(
            Trickle {
                data,
                pos: 0,
                step: 1,
            },
            plain_unpack(),
        );
        let values: Vec<Value> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(values.len(), 1);
        let map = values[0].as_map().unwrap();
        assert_eq!(map["x"], Value::Int(256));
        assert_eq!(map["y"], Value::Nil);
    }

    #[test]
    fn stops_after_the_first_error() {
        let reader = ValueReader::new(&[0xc1, 0x01][..], plain_unpack());
        let results: Vec<Result<Value>> = reader.take(5).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(DecodeError::UnrecognizedByte { byte: 0xc1, offset: 0 })
        ));
    }

    #[test]
    fn rejected_tag_is_reported_once() {
        let mut reader = ValueReader::new(&[0x91, 0xa1, b't', 0x01][..], plain_unpack());
        let err = reader.read_value().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Extension(ExtensionError::UnrecognizedType(_))
        ));
        assert_eq!(reader.read_value().unwrap(), None);
        assert_eq!(reader.read_value().unwrap(), None);
    }

    #[test]
    fn eof_inside_a_value() {
        let mut reader = ValueReader::new(Cursor::new(vec![0x07, 0xa3, b'a']), plain_unpack());
        assert_eq!(reader.read_value().unwrap(), Some(Value::Int(7)));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, DecodeError::Insufficient { offset: 3 }));
    }
}
