//! Resumable decoding state machine.
//!
//! [`DecodeState`] consumes whatever bytes are available and stops cleanly
//! at any byte boundary. The partially built value tree is kept on an
//! explicit stack, so feeding the remaining bytes later produces the same
//! result as decoding the whole input at once.

use std::sync::Arc;

use crate::config::DecoderOptions;
use crate::error::{DecodeError, Result};
use crate::ext::UnpackCtrl;
use crate::value::{Map, Value};
use crate::wire::{self, LengthKind};

/// The top-level value is decoded at depth 1.
pub(crate) const TOP_LEVEL_DEPTH: usize = 1;

/// Declared lengths are untrusted; larger collections grow as they fill.
const PREALLOC_LIMIT: usize = 1024;

const FORBIDDEN_KEY: &str = "__proto__";

/// Options and hooks shared by every decode driver of one decoder.
pub(crate) struct DecodeConfig {
    pub(crate) options: DecoderOptions,
    pub(crate) ctrl: Arc<dyn UnpackCtrl>,
}

/// Outcome of one [`DecodeState::advance`] call.
#[derive(Debug)]
pub(crate) struct Step {
    /// The completed value, or `None` when the input ran out first.
    pub(crate) value: Option<Value>,
    /// Bytes of the input that were consumed.
    pub(crate) consumed: usize,
}

/// An array or map whose elements are still arriving.
#[derive(Debug)]
enum Frame {
    Array {
        remaining: usize,
        object_type: Option<Value>,
        items: Vec<Value>,
    },
    Map {
        remaining: usize,
        object_type: Option<Value>,
        key: Option<String>,
        entries: Map,
    },
}

impl Frame {
    fn array(len: usize) -> Self {
        Frame::Array {
            remaining: len,
            object_type: None,
            items: Vec::with_capacity(len.min(PREALLOC_LIMIT)),
        }
    }

    fn map(len: usize) -> Self {
        Frame::Map {
            remaining: len,
            object_type: None,
            key: None,
            entries: Map::with_capacity(len.min(PREALLOC_LIMIT)),
        }
    }

    /// Place a completed child value. Returns true once the frame is full.
    ///
    /// The first child is always the object-type slot.
    fn accept(&mut self, value: Value, offset: usize, options: &DecoderOptions) -> Result<bool> {
        match self {
            Frame::Array {
                remaining,
                object_type,
                items,
            } => {
                if object_type.is_none() {
                    *object_type = Some(value);
                } else {
                    items.push(value);
                    *remaining -= 1;
                }
                Ok(*remaining == 0)
            }
            Frame::Map {
                remaining,
                object_type,
                key,
                entries,
            } => {
                if object_type.is_none() {
                    *object_type = Some(value);
                } else if let Some(key) = key.take() {
                    // duplicate keys: last one wins
                    entries.insert(key, value);
                    *remaining -= 1;
                } else {
                    *key = Some(map_key(value, offset, options)?);
                }
                Ok(*remaining == 0 && key.is_none())
            }
        }
    }

    /// Turn a full frame into a value, routing tagged frames to the hooks.
    fn finish(self, ctrl: &dyn UnpackCtrl) -> Result<Value> {
        let value = match self {
            Frame::Array {
                object_type: None | Some(Value::Nil),
                items,
                ..
            } => Value::Array(items),
            Frame::Array {
                object_type: Some(tag),
                items,
                ..
            } => ctrl.from_list(tag, items)?,
            Frame::Map {
                object_type: None | Some(Value::Nil),
                entries,
                ..
            } => Value::Map(entries),
            Frame::Map {
                object_type: Some(tag),
                entries,
                ..
            } => ctrl.from_dict(tag, entries)?,
        };
        Ok(value)
    }
}

fn map_key(value: Value, offset: usize, options: &DecoderOptions) -> Result<String> {
    let key = match (&options.map_key_converter, value) {
        (Some(convert), value) => convert(&value).ok_or_else(|| DecodeError::InvalidKeyType {
            found: value.kind(),
            offset,
        })?,
        (None, Value::Str(key)) => key,
        (None, other) => {
            return Err(DecodeError::InvalidKeyType {
                found: other.kind(),
                offset,
            })
        }
    };
    if key == FORBIDDEN_KEY {
        return Err(DecodeError::ForbiddenKey { offset });
    }
    Ok(key)
}

/// What one tag byte (plus its length and payload) turned into.
enum Head {
    Value(Value),
    Array(usize),
    Map(usize),
}

/// Bounded view over one input window. `base` is the absolute offset of
/// the window's first byte.
struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.input.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes: [u8; N] = self.input.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn take_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.input.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(bytes)
    }

    /// Read a big-endian length of `width` bytes without consuming it.
    fn peek_len(&self, width: usize) -> Option<usize> {
        let bytes = self.input.get(self.pos..self.pos + width)?;
        Some(bytes.iter().fold(0usize, |len, byte| (len << 8) | usize::from(*byte)))
    }

    fn skip(&mut self, len: usize) {
        self.pos += len;
    }
}

fn check_length(kind: LengthKind, length: usize, max: usize, offset: usize) -> Result<usize> {
    if length > max {
        return Err(DecodeError::MaxLengthExceeded {
            kind,
            length,
            max,
            offset,
        });
    }
    Ok(length)
}

/// Read a length-prefixed payload atomically. The declared length is
/// checked as soon as it is visible, before the payload is awaited.
fn payload<'a>(
    r: &mut Reader<'a>,
    width: usize,
    kind: LengthKind,
    max: usize,
    at: usize,
) -> Result<Option<&'a [u8]>> {
    let Some(len) = r.peek_len(width) else {
        return Ok(None);
    };
    check_length(kind, len, max, at)?;
    if r.remaining() < width + len {
        return Ok(None);
    }
    r.skip(width);
    Ok(r.take_slice(len))
}

fn to_str(bytes: &[u8], at: usize) -> Result<Value> {
    std::str::from_utf8(bytes)
        .map(|s| Value::Str(s.to_owned()))
        .map_err(|_| DecodeError::InvalidUtf8 { offset: at })
}

fn collection_len(
    r: &mut Reader<'_>,
    width: usize,
    kind: LengthKind,
    max: usize,
    at: usize,
) -> Result<Option<usize>> {
    let Some(len) = r.peek_len(width) else {
        return Ok(None);
    };
    check_length(kind, len, max, at)?;
    r.skip(width);
    Ok(Some(len))
}

/// Interpret the tag byte `head` found at absolute offset `at`. Returns
/// `None` without consuming anything when the rest of the header or
/// payload has not arrived yet.
fn parse_head(head: u8, at: usize, r: &mut Reader<'_>, opts: &DecoderOptions) -> Result<Option<Head>> {
    use LengthKind::{Array, Bin, Map, Str};

    let parsed = match head {
        0x00..=0x7f => Some(Head::Value(Value::Int(i64::from(head)))),
        wire::NEGATIVE_FIXINT..=0xff => Some(Head::Value(Value::Int(i64::from(head as i8)))),
        0x80..=0x8f => Some(Head::Map(check_length(
            Map,
            usize::from(head & 0x0f),
            opts.max_map_length,
            at,
        )?)),
        0x90..=0x9f => Some(Head::Array(check_length(
            Array,
            usize::from(head & 0x0f),
            opts.max_array_length,
            at,
        )?)),
        0xa0..=0xbf => {
            let len = check_length(Str, usize::from(head & 0x1f), opts.max_str_length, at)?;
            match r.take_slice(len) {
                Some(bytes) => Some(Head::Value(to_str(bytes, at)?)),
                None => None,
            }
        }
        wire::NIL => Some(Head::Value(Value::Nil)),
        wire::FALSE => Some(Head::Value(Value::Bool(false))),
        wire::TRUE => Some(Head::Value(Value::Bool(true))),
        wire::BIN8 | wire::BIN16 | wire::BIN32 => {
            let width = 1usize << (head - wire::BIN8);
            payload(r, width, Bin, opts.max_bin_length, at)?
                .map(|bytes| Head::Value(Value::Bin(bytes.to_vec().into())))
        }
        wire::FLOAT32 => r
            .take::<4>()
            .map(|b| Head::Value(Value::Float(f64::from(f32::from_be_bytes(b))))),
        wire::FLOAT64 => r
            .take::<8>()
            .map(|b| Head::Value(Value::Float(f64::from_be_bytes(b)))),
        wire::UINT8 => r.take::<1>().map(|b| Head::Value(Value::Int(i64::from(b[0])))),
        wire::UINT16 => r
            .take::<2>()
            .map(|b| Head::Value(Value::Int(i64::from(u16::from_be_bytes(b))))),
        wire::UINT32 => r
            .take::<4>()
            .map(|b| Head::Value(Value::Int(i64::from(u32::from_be_bytes(b))))),
        wire::UINT64 => r
            .take::<8>()
            .map(|b| Head::Value(Value::from_u64(u64::from_be_bytes(b)))),
        wire::INT8 => r
            .take::<1>()
            .map(|b| Head::Value(Value::Int(i64::from(i8::from_be_bytes(b))))),
        wire::INT16 => r
            .take::<2>()
            .map(|b| Head::Value(Value::Int(i64::from(i16::from_be_bytes(b))))),
        wire::INT32 => r
            .take::<4>()
            .map(|b| Head::Value(Value::Int(i64::from(i32::from_be_bytes(b))))),
        wire::INT64 => r
            .take::<8>()
            .map(|b| Head::Value(Value::Int(i64::from_be_bytes(b)))),
        wire::STR8 | wire::STR16 | wire::STR32 => {
            let width = 1usize << (head - wire::STR8);
            match payload(r, width, Str, opts.max_str_length, at)? {
                Some(bytes) => Some(Head::Value(to_str(bytes, at)?)),
                None => None,
            }
        }
        wire::ARRAY16 => collection_len(r, 2, Array, opts.max_array_length, at)?.map(Head::Array),
        wire::ARRAY32 => collection_len(r, 4, Array, opts.max_array_length, at)?.map(Head::Array),
        wire::MAP16 => collection_len(r, 2, Map, opts.max_map_length, at)?.map(Head::Map),
        wire::MAP32 => collection_len(r, 4, Map, opts.max_map_length, at)?.map(Head::Map),
        _ => return Err(DecodeError::UnrecognizedByte { byte: head, offset: at }),
    };
    Ok(parsed)
}

/// Parse a top-level array header at the start of `input`, whose first
/// byte sits at absolute offset `at`. Returns the declared length and the
/// header size, or `None` while the header is incomplete.
pub(crate) fn array_header(
    input: &[u8],
    at: usize,
    opts: &DecoderOptions,
) -> Result<Option<(usize, usize)>> {
    let mut r = Reader {
        input,
        pos: 0,
        base: at,
    };
    let Some(head) = r.next_byte() else {
        return Ok(None);
    };
    if !wire::is_array_head(head) {
        return Err(DecodeError::NotAnArray { byte: head, offset: at });
    }
    match parse_head(head, at, &mut r, opts)? {
        Some(Head::Array(len)) => Ok(Some((len, r.pos))),
        _ => Ok(None),
    }
}

/// Progress through one value, carried across input windows.
#[derive(Debug)]
pub(crate) struct DecodeState {
    stack: Vec<Frame>,
    /// Tag byte (and its offset) whose header or payload is still incomplete.
    head: Option<(u8, usize)>,
    base_depth: usize,
    /// Absolute offset of the next input window.
    offset: usize,
}

impl DecodeState {
    pub(crate) fn new(base_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            head: None,
            base_depth,
            offset: 0,
        }
    }

    /// Forget any partial value and start counting offsets from zero.
    pub(crate) fn reset(&mut self, base_depth: usize) {
        self.stack.clear();
        self.head = None;
        self.base_depth = base_depth;
        self.offset = 0;
    }

    /// True when no value is partially decoded.
    pub(crate) fn is_idle(&self) -> bool {
        self.stack.is_empty() && self.head.is_none()
    }

    /// Absolute offset of the next byte to be fed.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Account for bytes consumed outside the state machine.
    pub(crate) fn skip(&mut self, len: usize) {
        self.offset += len;
    }

    /// Consume bytes from `input` until one value completes or the input
    /// runs out. Unconsumed bytes must be presented again, followed by new
    /// ones, on the next call.
    pub(crate) fn advance(&mut self, input: &[u8], config: &DecodeConfig) -> Result<Step> {
        let mut reader = Reader {
            input,
            pos: 0,
            base: self.offset,
        };
        match self.run(&mut reader, config) {
            Ok(value) => {
                self.offset += reader.pos;
                Ok(Step {
                    value,
                    consumed: reader.pos,
                })
            }
            Err(err) => {
                // The failed value is abandoned; nothing of it was consumed.
                self.stack.clear();
                self.head = None;
                Err(err)
            }
        }
    }

    fn run(&mut self, r: &mut Reader<'_>, config: &DecodeConfig) -> Result<Option<Value>> {
        let options = &config.options;
        loop {
            let (byte, at) = match self.head {
                Some(head) => head,
                None => {
                    let at = r.offset();
                    let Some(byte) = r.next_byte() else {
                        return Ok(None);
                    };
                    let depth = self.base_depth + self.stack.len();
                    if depth > options.max_depth {
                        return Err(DecodeError::DepthExceeded { depth, offset: at });
                    }
                    self.head = Some((byte, at));
                    (byte, at)
                }
            };

            let Some(head) = parse_head(byte, at, r, options)? else {
                return Ok(None);
            };
            self.head = None;

            let mut value = match head {
                Head::Value(value) => value,
                Head::Array(len) => {
                    self.stack.push(Frame::array(len));
                    continue;
                }
                Head::Map(len) => {
                    self.stack.push(Frame::map(len));
                    continue;
                }
            };

            // Fold the finished value into its parents, closing every frame
            // it completes.
            loop {
                let Some(frame) = self.stack.last_mut() else {
                    return Ok(Some(value));
                };
                if !frame.accept(value, at, options)? {
                    break;
                }
                let Some(frame) = self.stack.pop() else {
                    break;
                };
                value = frame.finish(config.ctrl.as_ref())?;
            }
        }
    }
}
