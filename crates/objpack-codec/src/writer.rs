use std::io::{ErrorKind, Write};

use crate::encoder::Encoder;
use crate::error::EncodeError;
use crate::ext::PackCtrl;
use crate::value::Value;

/// Writes encoded values to any blocking `Write` stream.
pub struct ValueWriter<T> {
    inner: T,
    encoder: Encoder,
}

impl<T: Write> ValueWriter<T> {
    /// Create a value writer encoding with `ctrl`.
    pub fn new<C: PackCtrl + 'static>(inner: T, ctrl: C) -> Self {
        Self {
            inner,
            encoder: Encoder::new(ctrl),
        }
    }

    /// Encode a value and write it out in full (blocking).
    pub fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        let bytes = self.encoder.encode_shared_ref(value)?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(EncodeError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(EncodeError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(EncodeError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
