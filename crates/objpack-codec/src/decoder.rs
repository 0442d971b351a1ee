use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use futures_core::Stream;
use tracing::debug;

use crate::config::DecoderOptions;
use crate::cursor::{DecodeConfig, DecodeState, Step, TOP_LEVEL_DEPTH};
use crate::error::{DecodeError, Result};
use crate::ext::UnpackCtrl;
use crate::reentry::Entered;
use crate::stream::{self, ArrayStream, MultiStream};
use crate::value::Value;

/// Decodes MessagePack with object-type slots back into [`Value`] trees.
///
/// Synchronous calls reuse one internal decode state. A call made while
/// another is in flight on the same instance (for example from inside an
/// [`UnpackCtrl`] hook) runs on a scratch instance. Iterators and streams
/// carry their own state and never share it.
pub struct Decoder {
    config: Arc<DecodeConfig>,
    state: Mutex<DecodeState>,
    entered: AtomicBool,
}

impl Decoder {
    /// Create a decoder; options are read from the controller once.
    pub fn new<C: UnpackCtrl + 'static>(ctrl: C) -> Self {
        Self::from_shared(Arc::new(ctrl))
    }

    /// Create a decoder over a shared controller.
    pub fn from_shared(ctrl: Arc<dyn UnpackCtrl>) -> Self {
        let options = ctrl.options();
        Self {
            config: Arc::new(DecodeConfig { options, ctrl }),
            state: Mutex::new(DecodeState::new(TOP_LEVEL_DEPTH)),
            entered: AtomicBool::new(false),
        }
    }

    /// The options this decoder was built with.
    pub fn options(&self) -> &DecoderOptions {
        &self.config.options
    }

    fn fork(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            state: Mutex::new(DecodeState::new(TOP_LEVEL_DEPTH)),
            entered: AtomicBool::new(false),
        }
    }

    /// Decode exactly one value spanning all of `input`.
    ///
    /// Fails with [`DecodeError::Insufficient`] if the value is incomplete and
    /// [`DecodeError::ExtraBytes`] if bytes follow it.
    pub fn decode(&self, input: &[u8]) -> Result<Value> {
        let Some(_entered) = Entered::try_enter(&self.entered) else {
            debug!("decoder already in use; decoding on a scratch instance");
            return self.fork().decode(input);
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.reset(TOP_LEVEL_DEPTH);
        let result = decode_exact(&mut state, input, &self.config);
        if let Err(err) = &result {
            debug!(error = %err, len = input.len(), "decode failed");
        }
        result
    }

    /// Decode consecutive values from `input`.
    pub fn decode_multi<'a>(&self, input: &'a [u8]) -> DecodeMulti<'a> {
        DecodeMulti {
            input,
            total: input.len(),
            config: Arc::clone(&self.config),
            state: DecodeState::new(TOP_LEVEL_DEPTH),
            done: false,
        }
    }

    /// Decode exactly one value from a chunk source.
    ///
    /// The source is read to its end; any byte after the value is an error.
    pub async fn decode_async<S, B>(&self, source: S) -> Result<Value>
    where
        S: Stream<Item = io::Result<B>> + Unpin,
        B: AsRef<[u8]>,
    {
        stream::decode_one(Arc::clone(&self.config), source).await
    }

    /// Stream the elements of one top-level array as they complete.
    pub fn decode_array_stream<S, B>(&self, source: S) -> ArrayStream<S>
    where
        S: Stream<Item = io::Result<B>> + Unpin,
        B: AsRef<[u8]>,
    {
        ArrayStream::new(Arc::clone(&self.config), source)
    }

    /// Stream consecutive top-level values as they complete.
    pub fn decode_multi_stream<S, B>(&self, source: S) -> MultiStream<S>
    where
        S: Stream<Item = io::Result<B>> + Unpin,
        B: AsRef<[u8]>,
    {
        MultiStream::new(Arc::clone(&self.config), source)
    }
}

fn decode_exact(state: &mut DecodeState, input: &[u8], config: &DecodeConfig) -> Result<Value> {
    match state.advance(input, config)? {
        Step {
            value: Some(value),
            consumed,
        } if consumed == input.len() => Ok(value),
        Step {
            value: Some(_),
            consumed,
        } => Err(DecodeError::ExtraBytes {
            extra: input.len() - consumed,
            total: input.len(),
            offset: consumed,
        }),
        Step { value: None, .. } => Err(DecodeError::Insufficient {
            offset: input.len(),
        }),
    }
}

/// Iterator over the consecutive values of one buffer.
///
/// Yields nothing for an empty buffer. A truncated trailing value yields
/// [`DecodeError::Insufficient`]. The iterator ends after the first error.
pub struct DecodeMulti<'a> {
    input: &'a [u8],
    total: usize,
    config: Arc<DecodeConfig>,
    state: DecodeState,
    done: bool,
}

impl DecodeMulti<'_> {
    /// Offset of the next value within the original buffer.
    pub fn offset(&self) -> usize {
        self.total - self.input.len()
    }
}

impl Iterator for DecodeMulti<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.input.is_empty() {
            return None;
        }
        match self.state.advance(self.input, &self.config) {
            Ok(Step {
                value: Some(value),
                consumed,
            }) => {
                self.input = &self.input[consumed..];
                Some(Ok(value))
            }
            Ok(Step { value: None, .. }) => {
                self.done = true;
                Some(Err(DecodeError::Insufficient { offset: self.total }))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for DecodeMulti<'_> {}

/// Decode one value with a throwaway decoder.
pub fn decode<C: UnpackCtrl + 'static>(input: &[u8], ctrl: C) -> Result<Value> {
    Decoder::new(ctrl).decode(input)
}

/// Iterate the consecutive values of `input` with a throwaway decoder.
pub fn decode_multi<C: UnpackCtrl + 'static>(input: &[u8], ctrl: C) -> DecodeMulti<'_> {
    Decoder::new(ctrl).decode_multi(input)
}

/// Decode one value from a chunk source with a throwaway decoder.
pub async fn decode_async<S, B, C>(source: S, ctrl: C) -> Result<Value>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
    C: UnpackCtrl + 'static,
{
    let config = Arc::new(DecodeConfig {
        options: ctrl.options(),
        ctrl: Arc::new(ctrl),
    });
    stream::decode_one(config, source).await
}

/// Stream the elements of one top-level array with a throwaway decoder.
pub fn decode_array_stream<S, B, C>(source: S, ctrl: C) -> ArrayStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
    C: UnpackCtrl + 'static,
{
    Decoder::new(ctrl).decode_array_stream(source)
}

/// Stream consecutive top-level values with a throwaway decoder.
pub fn decode_multi_stream<S, B, C>(source: S, ctrl: C) -> MultiStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
    C: UnpackCtrl + 'static,
{
    Decoder::new(ctrl).decode_multi_stream(source)
}
