use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// Append-only write buffer used by the encoder.
///
/// A write that would overflow the current capacity grows the buffer to
/// twice the size required, so appends are amortized O(1).
#[derive(Debug)]
pub struct ByteSink {
    buf: BytesMut,
    initial_size: usize,
}

impl ByteSink {
    /// Create a sink with `initial_size` bytes of capacity.
    pub fn with_capacity(initial_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(initial_size),
            initial_size,
        }
    }

    /// Discard written bytes. Capacity is kept where possible.
    pub fn reset(&mut self) {
        self.buf.clear();
        if self.buf.capacity() == 0 {
            self.buf.reserve(self.initial_size);
        }
    }

    /// Make room for `additional` more bytes.
    pub fn ensure(&mut self, additional: usize) {
        let required = self.buf.len() + additional;
        if self.buf.capacity() < required {
            let target = required.saturating_mul(2);
            trace!(from = self.buf.capacity(), to = target, "growing encode buffer");
            self.buf.reserve(target - self.buf.len());
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The bytes written since the last reset.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Hand the written bytes out without copying. The sink keeps whatever
    /// capacity is left and reclaims the rest once the handle is dropped.
    pub fn split(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.ensure(1);
        self.buf.put_u8(value);
    }

    /// A tag byte followed by a one-byte payload.
    pub fn put_tag_u8(&mut self, tag: u8, value: u8) {
        self.ensure(2);
        self.buf.put_u8(tag);
        self.buf.put_u8(value);
    }

    pub fn put_tag_u16(&mut self, tag: u8, value: u16) {
        self.ensure(3);
        self.buf.put_u8(tag);
        self.buf.put_u16(value);
    }

    pub fn put_tag_u32(&mut self, tag: u8, value: u32) {
        self.ensure(5);
        self.buf.put_u8(tag);
        self.buf.put_u32(value);
    }

    pub fn put_tag_u64(&mut self, tag: u8, value: u64) {
        self.ensure(9);
        self.buf.put_u8(tag);
        self.buf.put_u64(value);
    }

    pub fn put_tag_i8(&mut self, tag: u8, value: i8) {
        self.ensure(2);
        self.buf.put_u8(tag);
        self.buf.put_i8(value);
    }

    pub fn put_tag_i16(&mut self, tag: u8, value: i16) {
        self.ensure(3);
        self.buf.put_u8(tag);
        self.buf.put_i16(value);
    }

    pub fn put_tag_i32(&mut self, tag: u8, value: i32) {
        self.ensure(5);
        self.buf.put_u8(tag);
        self.buf.put_i32(value);
    }

    pub fn put_tag_i64(&mut self, tag: u8, value: i64) {
        self.ensure(9);
        self.buf.put_u8(tag);
        self.buf.put_i64(value);
    }

    pub fn put_tag_f32(&mut self, tag: u8, value: f32) {
        self.ensure(5);
        self.buf.put_u8(tag);
        self.buf.put_f32(value);
    }

    pub fn put_tag_f64(&mut self, tag: u8, value: f64) {
        self.ensure(9);
        self.buf.put_u8(tag);
        self.buf.put_f64(value);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.buf.put_slice(bytes);
    }
}
