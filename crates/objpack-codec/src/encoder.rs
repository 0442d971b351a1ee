use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::AtomicBool;

use bytes::Bytes;
use tracing::debug;

use crate::config::EncoderOptions;
use crate::error::EncodeError;
use crate::ext::{Envelope, PackCtrl};
use crate::reentry::Entered;
use crate::sink::ByteSink;
use crate::value::{Map, Value};
use crate::wire::{self, LengthKind};

/// Encodes [`Value`] trees into MessagePack with object-type slots.
///
/// One instance reuses its write buffer across calls. A call made while
/// another is in flight on the same instance (for example from inside
/// [`PackCtrl::from_obj`]) runs on a scratch instance with the same options.
pub struct Encoder {
    ctrl: Arc<dyn PackCtrl>,
    options: EncoderOptions,
    sink: Mutex<ByteSink>,
    entered: AtomicBool,
}

impl Encoder {
    /// Create an encoder; options are read from the controller once.
    pub fn new<C: PackCtrl + 'static>(ctrl: C) -> Self {
        Self::from_shared(Arc::new(ctrl))
    }

    /// Create an encoder over a shared controller.
    pub fn from_shared(ctrl: Arc<dyn PackCtrl>) -> Self {
        let options = ctrl.options();
        Self {
            ctrl,
            options,
            sink: Mutex::new(ByteSink::with_capacity(options.initial_buffer_size)),
            entered: AtomicBool::new(false),
        }
    }

    /// The options this encoder was built with.
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encode `value` and return an independent copy of the bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        self.run(value, |sink| sink.as_slice().to_vec())
    }

    /// Encode `value` and return the bytes without copying them out of the
    /// internal buffer. The buffer space is reused by later calls once the
    /// returned handle is dropped.
    pub fn encode_shared_ref(&self, value: &Value) -> Result<Bytes, EncodeError> {
        self.run(value, ByteSink::split)
    }

    fn fork(&self) -> Self {
        Self {
            ctrl: Arc::clone(&self.ctrl),
            options: self.options,
            sink: Mutex::new(ByteSink::with_capacity(self.options.initial_buffer_size)),
            entered: AtomicBool::new(false),
        }
    }

    fn run<T>(
        &self,
        value: &Value,
        finish: impl FnOnce(&mut ByteSink) -> T,
    ) -> Result<T, EncodeError> {
        let Some(_entered) = Entered::try_enter(&self.entered) else {
            debug!("encoder already in use; encoding on a scratch instance");
            return self.fork().run(value, finish);
        };

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.reset();
        let mut writer = ValueWriter {
            sink: &mut *sink,
            ctrl: self.ctrl.as_ref(),
            options: &self.options,
        };
        if let Err(err) = writer.write(value, 1) {
            debug!(error = %err, "encode failed");
            return Err(err);
        }
        Ok(finish(&mut *sink))
    }
}

/// Encode `value` with a throwaway encoder.
pub fn encode<C: PackCtrl + 'static>(value: &Value, ctrl: C) -> Result<Bytes, EncodeError> {
    Encoder::new(ctrl).encode_shared_ref(value)
}

/// Depth-first walk emitting tags and payloads.
struct ValueWriter<'a> {
    sink: &'a mut ByteSink,
    ctrl: &'a dyn PackCtrl,
    options: &'a EncoderOptions,
}

impl ValueWriter<'_> {
    fn write(&mut self, value: &Value, depth: usize) -> Result<(), EncodeError> {
        if depth > self.options.max_depth {
            return Err(EncodeError::DepthExceeded { depth });
        }

        match value {
            Value::Nil | Value::Undefined => self.sink.put_u8(wire::NIL),
            Value::Bool(false) => self.sink.put_u8(wire::FALSE),
            Value::Bool(true) => self.sink.put_u8(wire::TRUE),
            Value::Int(int) => self.write_int(*int),
            Value::UInt(uint) => self.write_uint(*uint),
            Value::Float(float) => self.write_float(*float),
            Value::Str(string) => self.write_str(string)?,
            Value::Bin(bytes) => self.write_bin(bytes)?,
            Value::Array(items) => self.write_array(&Value::Nil, items, depth)?,
            Value::Map(entries) => self.write_map(&Value::Nil, entries, depth)?,
            Value::Object(object) => match self.ctrl.from_obj(object)? {
                Envelope::Map {
                    object_type,
                    entries,
                } => self.write_map(&object_type, &entries, depth)?,
                Envelope::List { object_type, items } => {
                    self.write_array(&object_type, &items, depth)?
                }
            },
        }
        Ok(())
    }

    fn write_uint(&mut self, uint: u64) {
        if self.options.force_integer_to_float {
            self.write_float(uint as f64);
        } else if uint < 0x80 {
            self.sink.put_u8(uint as u8);
        } else if uint < 0x100 {
            self.sink.put_tag_u8(wire::UINT8, uint as u8);
        } else if uint < 0x1_0000 {
            self.sink.put_tag_u16(wire::UINT16, uint as u16);
        } else if uint < 0x1_0000_0000 {
            self.sink.put_tag_u32(wire::UINT32, uint as u32);
        } else if self.options.use_big_int64 {
            self.sink.put_tag_u64(wire::UINT64, uint);
        } else {
            self.write_float(uint as f64);
        }
    }

    fn write_int(&mut self, int: i64) {
        if int >= 0 {
            self.write_uint(int as u64);
        } else if self.options.force_integer_to_float {
            self.write_float(int as f64);
        } else if int >= -0x20 {
            // negative fixint
            self.sink.put_u8(int as i8 as u8);
        } else if int >= -0x80 {
            self.sink.put_tag_i8(wire::INT8, int as i8);
        } else if int >= -0x8000 {
            self.sink.put_tag_i16(wire::INT16, int as i16);
        } else if int >= -0x8000_0000 {
            self.sink.put_tag_i32(wire::INT32, int as i32);
        } else if self.options.use_big_int64 {
            self.sink.put_tag_i64(wire::INT64, int);
        } else {
            self.write_float(int as f64);
        }
    }

    fn write_float(&mut self, float: f64) {
        if self.options.force_float32 {
            self.sink.put_tag_f32(wire::FLOAT32, float as f32);
        } else {
            self.sink.put_tag_f64(wire::FLOAT64, float);
        }
    }

    fn write_str(&mut self, string: &str) -> Result<(), EncodeError> {
        let len = encodable_len(LengthKind::Str, string.len())?;
        self.sink.ensure(5 + len);
        if len <= wire::FIXSTR_MAX_LEN {
            self.sink.put_u8(wire::FIXSTR + len as u8);
        } else if len < 0x100 {
            self.sink.put_tag_u8(wire::STR8, len as u8);
        } else if len < 0x1_0000 {
            self.sink.put_tag_u16(wire::STR16, len as u16);
        } else {
            self.sink.put_tag_u32(wire::STR32, len as u32);
        }
        self.sink.put_slice(string.as_bytes());
        Ok(())
    }

    fn write_bin(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let len = encodable_len(LengthKind::Bin, bytes.len())?;
        if len < 0x100 {
            self.sink.put_tag_u8(wire::BIN8, len as u8);
        } else if len < 0x1_0000 {
            self.sink.put_tag_u16(wire::BIN16, len as u16);
        } else {
            self.sink.put_tag_u32(wire::BIN32, len as u32);
        }
        self.sink.put_slice(bytes);
        Ok(())
    }

    fn write_collection_header(
        &mut self,
        kind: LengthKind,
        len: usize,
    ) -> Result<(), EncodeError> {
        let len = encodable_len(kind, len)?;
        let (fix, tag16, tag32) = match kind {
            LengthKind::Array => (wire::FIXARRAY, wire::ARRAY16, wire::ARRAY32),
            _ => (wire::FIXMAP, wire::MAP16, wire::MAP32),
        };
        if len <= wire::FIXCOLLECTION_MAX_LEN {
            self.sink.put_u8(fix + len as u8);
        } else if len < 0x1_0000 {
            self.sink.put_tag_u16(tag16, len as u16);
        } else {
            self.sink.put_tag_u32(tag32, len as u32);
        }
        Ok(())
    }

    /// Header with the logical element count, then the object-type slot,
    /// then the elements.
    fn write_array(
        &mut self,
        object_type: &Value,
        items: &[Value],
        depth: usize,
    ) -> Result<(), EncodeError> {
        self.write_collection_header(LengthKind::Array, items.len())?;
        self.write(object_type, depth + 1)?;
        for item in items {
            self.write(item, depth + 1)?;
        }
        Ok(())
    }

    /// Header with the emitted pair count, then the object-type slot, then
    /// the pairs. The count has to be known before the header is written, so
    /// skipped entries are filtered out first.
    fn write_map(&mut self, object_type: &Value, map: &Map, depth: usize) -> Result<(), EncodeError> {
        let ignore_undefined = self.options.ignore_undefined;
        let mut entries: Vec<(&String, &Value)> = map
            .iter()
            .filter(|(_, value)| !(ignore_undefined && matches!(value, Value::Undefined)))
            .collect();
        if self.options.sort_keys {
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        }

        self.write_collection_header(LengthKind::Map, entries.len())?;
        self.write(object_type, depth + 1)?;
        for (key, value) in entries {
            self.write_str(key)?;
            self.write(value, depth + 1)?;
        }
        Ok(())
    }
}

/// Rejects lengths that do not fit a 32-bit header.
fn encodable_len(kind: LengthKind, len: usize) -> Result<usize, EncodeError> {
    if len as u64 >= wire::MAX_LENGTH {
        return Err(EncodeError::TooLarge { kind, size: len });
    }
    Ok(len)
}
