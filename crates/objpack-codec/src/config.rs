use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Default maximum nesting depth for both directions.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default initial size of the encoder's write buffer.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 2048;

/// Default per-type length limit: the largest length the wire format can carry.
pub const DEFAULT_MAX_LENGTH: usize = u32::MAX as usize;

/// Controls encoding. Fixed for the lifetime of one encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Write integers outside the 32-bit range as uint64/int64. When false
    /// they fall back to float64.
    pub use_big_int64: bool,
    /// Maximum nesting depth; the top-level value is at depth 1.
    pub max_depth: usize,
    /// Initial capacity of the write buffer in bytes.
    pub initial_buffer_size: usize,
    /// Emit map keys in lexicographic order for canonical output.
    ///
    /// Keys are compared by their UTF-8 bytes (Unicode scalar value order).
    /// This can differ from UTF-16 code-unit order when keys mix characters
    /// in U+E000..=U+FFFF with characters outside the Basic Multilingual Plane.
    pub sort_keys: bool,
    /// Write floats as float32 instead of float64.
    pub force_float32: bool,
    /// Drop map entries whose value is [`Value::Undefined`].
    pub ignore_undefined: bool,
    /// Write every integer as a float (honoring `force_float32`).
    pub force_integer_to_float: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            use_big_int64: false,
            max_depth: DEFAULT_MAX_DEPTH,
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            sort_keys: false,
            force_float32: false,
            ignore_undefined: false,
            force_integer_to_float: false,
        }
    }
}

/// Maps a decoded map key of any type to the string key to insert.
/// Returning `None` rejects the key.
pub type MapKeyConverter = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Controls decoding. Fixed for the lifetime of one decoder.
#[derive(Clone)]
pub struct DecoderOptions {
    /// Maximum UTF-8 byte length of a string (map keys included).
    pub max_str_length: usize,
    /// Maximum length of a binary payload.
    pub max_bin_length: usize,
    /// Maximum declared element count of an array.
    pub max_array_length: usize,
    /// Maximum declared pair count of a map.
    pub max_map_length: usize,
    /// Maximum nesting depth; the top-level value is at depth 1.
    pub max_depth: usize,
    /// Key conversion for maps with non-default key typing.
    pub map_key_converter: Option<MapKeyConverter>,
}

impl DecoderOptions {
    /// Set the key converter.
    pub fn with_map_key_converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.map_key_converter = Some(Arc::new(converter));
        self
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_str_length: DEFAULT_MAX_LENGTH,
            max_bin_length: DEFAULT_MAX_LENGTH,
            max_array_length: DEFAULT_MAX_LENGTH,
            max_map_length: DEFAULT_MAX_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            map_key_converter: None,
        }
    }
}

impl fmt::Debug for DecoderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderOptions")
            .field("max_str_length", &self.max_str_length)
            .field("max_bin_length", &self.max_bin_length)
            .field("max_array_length", &self.max_array_length)
            .field("max_map_length", &self.max_map_length)
            .field("max_depth", &self.max_depth)
            .field("map_key_converter", &self.map_key_converter.is_some())
            .finish()
    }
}
