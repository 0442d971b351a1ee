//! Decode drivers over asynchronous chunk sources.
//!
//! A chunk source is any `Stream<Item = io::Result<B>>` with `B: AsRef<[u8]>`.
//! Chunk boundaries are arbitrary: a value may span any number of chunks and
//! one chunk may hold many values.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use futures_core::Stream;
use tracing::trace;

use crate::cursor::{self, DecodeConfig, DecodeState, TOP_LEVEL_DEPTH};
use crate::error::{DecodeError, Result};
use crate::value::Value;

/// Pulls chunks from a source into a backlog and runs the decode state
/// machine over it.
struct Feed<S> {
    source: S,
    backlog: BytesMut,
    state: DecodeState,
    config: Arc<DecodeConfig>,
    exhausted: bool,
}

impl<S, B> Feed<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    fn new(config: Arc<DecodeConfig>, source: S, base_depth: usize) -> Self {
        Self {
            source,
            backlog: BytesMut::new(),
            state: DecodeState::new(base_depth),
            config,
            exhausted: false,
        }
    }

    /// Poll the source once, appending any chunk to the backlog.
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        match Pin::new(&mut self.source).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                let chunk = chunk.as_ref();
                trace!(len = chunk.len(), "chunk received");
                self.backlog.extend_from_slice(chunk);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Err(err.into())),
            Poll::Ready(None) => {
                self.exhausted = true;
                Poll::Ready(Ok(()))
            }
        }
    }

    /// Absolute offset just past the bytes received so far.
    fn received(&self) -> usize {
        self.state.offset() + self.backlog.len()
    }

    /// Poll for the next complete value. `Ready(None)` means the source ended
    /// cleanly between values.
    fn poll_value(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Value>>> {
        loop {
            if !self.backlog.is_empty() {
                match self.state.advance(&self.backlog, &self.config) {
                    Ok(step) => {
                        self.backlog.advance(step.consumed);
                        if let Some(value) = step.value {
                            return Poll::Ready(Some(Ok(value)));
                        }
                    }
                    Err(err) => return Poll::Ready(Some(Err(err))),
                }
            }

            if self.exhausted {
                if self.backlog.is_empty() && self.state.is_idle() {
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(Err(DecodeError::Insufficient {
                    offset: self.received(),
                })));
            }

            if let Err(err) = std::task::ready!(self.poll_chunk(cx)) {
                return Poll::Ready(Some(Err(err)));
            }
        }
    }

    /// Drain the source, failing on the first byte that arrives.
    fn poll_end(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        loop {
            if !self.backlog.is_empty() {
                let offset = self.state.offset();
                return Poll::Ready(Err(DecodeError::ExtraBytes {
                    extra: self.backlog.len(),
                    total: self.received(),
                    offset,
                }));
            }
            if self.exhausted {
                return Poll::Ready(Ok(()));
            }
            std::task::ready!(self.poll_chunk(cx))?;
        }
    }
}

pub(crate) async fn decode_one<S, B>(config: Arc<DecodeConfig>, source: S) -> Result<Value>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut feed = Feed::new(config, source, TOP_LEVEL_DEPTH);
    let value = match poll_fn(|cx| feed.poll_value(cx)).await {
        Some(result) => result?,
        None => return Err(DecodeError::Insufficient { offset: 0 }),
    };
    poll_fn(|cx| feed.poll_end(cx)).await?;
    Ok(value)
}

/// Stream of consecutive top-level values.
///
/// Ends cleanly when the source ends between values. A source that ends in
/// the middle of a value yields [`DecodeError::Insufficient`]. The stream
/// ends after the first error.
pub struct MultiStream<S> {
    feed: Feed<S>,
    done: bool,
}

impl<S, B> MultiStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    pub(crate) fn new(config: Arc<DecodeConfig>, source: S) -> Self {
        Self {
            feed: Feed::new(config, source, TOP_LEVEL_DEPTH),
            done: false,
        }
    }
}

impl<S, B> Stream for MultiStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let next = std::task::ready!(this.feed.poll_value(cx));
        if !matches!(next, Some(Ok(_))) {
            this.done = true;
        }
        Poll::Ready(next)
    }
}

#[derive(Debug, Clone, Copy)]
enum ArrayPhase {
    Header,
    Slot { len: usize },
    Items { remaining: usize },
    Done,
}

/// Stream of the elements of one top-level array.
///
/// The input must start with an array header whose object-type slot is nil.
/// Elements are yielded as each completes; bytes after the array are not
/// read. The stream ends after the first error.
pub struct ArrayStream<S> {
    feed: Feed<S>,
    phase: ArrayPhase,
}

impl<S, B> ArrayStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    pub(crate) fn new(config: Arc<DecodeConfig>, source: S) -> Self {
        Self {
            // elements sit one level below the array
            feed: Feed::new(config, source, TOP_LEVEL_DEPTH + 1),
            phase: ArrayPhase::Header,
        }
    }

    fn poll_header(&mut self, cx: &mut Context<'_>) -> Poll<Result<usize>> {
        loop {
            let offset = self.feed.state.offset();
            let header =
                cursor::array_header(&self.feed.backlog, offset, &self.feed.config.options)?;
            if let Some((len, size)) = header {
                self.feed.backlog.advance(size);
                self.feed.state.skip(size);
                return Poll::Ready(Ok(len));
            }
            if self.feed.exhausted {
                return Poll::Ready(Err(DecodeError::Insufficient {
                    offset: self.feed.received(),
                }));
            }
            std::task::ready!(self.feed.poll_chunk(cx))?;
        }
    }

    /// The next element, or a truncation error if the source ends first.
    fn poll_element(&mut self, cx: &mut Context<'_>) -> Poll<Result<Value>> {
        match std::task::ready!(self.feed.poll_value(cx)) {
            Some(result) => Poll::Ready(result),
            None => Poll::Ready(Err(DecodeError::Insufficient {
                offset: self.feed.received(),
            })),
        }
    }

    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Value>>> {
        loop {
            match self.phase {
                ArrayPhase::Header => {
                    let len = std::task::ready!(self.poll_header(cx))?;
                    self.phase = ArrayPhase::Slot { len };
                }
                ArrayPhase::Slot { len } => {
                    let offset = self.feed.state.offset();
                    let object_type = std::task::ready!(self.poll_element(cx))?;
                    if !object_type.is_nil() {
                        return Poll::Ready(Some(Err(DecodeError::TaggedArrayStream {
                            offset,
                        })));
                    }
                    self.phase = ArrayPhase::Items { remaining: len };
                }
                ArrayPhase::Items { remaining: 0 } | ArrayPhase::Done => {
                    self.phase = ArrayPhase::Done;
                    return Poll::Ready(None);
                }
                ArrayPhase::Items { remaining } => {
                    let item = std::task::ready!(self.poll_element(cx))?;
                    self.phase = ArrayPhase::Items {
                        remaining: remaining - 1,
                    };
                    return Poll::Ready(Some(Ok(item)));
                }
            }
        }
    }
}

impl<S, B> Stream for ArrayStream<S>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = std::task::ready!(this.poll_step(cx));
        if matches!(next, Some(Err(_))) {
            this.phase = ArrayPhase::Done;
        }
        Poll::Ready(next)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream::{self, StreamExt};

    use super::*;
    use crate::decoder::Decoder;
    use crate::ext::plain_unpack;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = io::Result<Vec<u8>>> + Unpin {
        let parts: Vec<io::Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.to_vec())).collect();
        stream::iter(parts)
    }

    fn bytewise(bytes: &[u8]) -> impl Stream<Item = io::Result<Vec<u8>>> + Unpin {
        let parts: Vec<io::Result<Vec<u8>>> = bytes.iter().map(|b| Ok(vec![*b])).collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn decode_async_across_chunks() {
        let decoder = Decoder::new(plain_unpack());
        let value = decoder
            .decode_async(chunks(&[&[0x92, 0xc0], &[0xa3, b'f'], &[b'o', b'o', 0x2a]]))
            .await
            .unwrap();
        assert_eq!(value, Value::Array(vec![Value::from("foo"), Value::Int(42)]));
    }

    #[tokio::test]
    async fn decode_async_rejects_trailing_and_missing_bytes() {
        let decoder = Decoder::new(plain_unpack());

        let err = decoder
            .decode_async(chunks(&[&[0x01], &[], &[0x02]]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ExtraBytes {
                extra: 1,
                total: 2,
                offset: 1
            }
        ));

        let err = decoder.decode_async(chunks(&[&[0x92, 0xc0, 0x01]])).await.unwrap_err();
        assert!(matches!(err, DecodeError::Insufficient { offset: 3 }));

        let err = decoder.decode_async(chunks(&[])).await.unwrap_err();
        assert!(matches!(err, DecodeError::Insufficient { offset: 0 }));
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let decoder = Decoder::new(plain_unpack());
        let parts: Vec<io::Result<Vec<u8>>> = vec![
            Ok(vec![0x92, 0xc0]),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
        ];
        let err = decoder.decode_async(stream::iter(parts)).await.unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[tokio::test]
    async fn multi_stream_yields_values_then_ends() {
        let decoder = Decoder::new(plain_unpack());
        let values: Vec<Value> = decoder
            .decode_multi_stream(bytewise(&[0x01, 0xa1, b'x', 0x91, 0xc0, 0xc3]))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            values,
            vec![
                Value::Int(1),
                Value::from("x"),
                Value::Array(vec![Value::Bool(true)])
            ]
        );

        let empty: Vec<Result<Value>> = decoder.decode_multi_stream(chunks(&[])).collect().await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn multi_stream_reports_truncation() {
        let decoder = Decoder::new(plain_unpack());
        let results: Vec<Result<Value>> = decoder
            .decode_multi_stream(chunks(&[&[0x07, 0xa2, b'a']]))
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), Value::Int(7));
        assert!(matches!(results[1], Err(DecodeError::Insufficient { offset: 3 })));
    }

    #[tokio::test]
    async fn array_stream_yields_elements() {
        let decoder = Decoder::new(plain_unpack());
        let bytes = [0x93, 0xc0, 0x01, 0x91, 0xc0, 0x02, 0xa1, b'z', 0xff];
        let values: Vec<Value> = decoder
            .decode_array_stream(bytewise(&bytes))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            values,
            vec![
                Value::Int(1),
                Value::Array(vec![Value::Int(2)]),
                Value::from("z")
            ]
        );
    }

    #[tokio::test]
    async fn array_stream_handles_wide_headers_and_empty_arrays() {
        let decoder = Decoder::new(plain_unpack());
        let mut bytes = vec![0xdc, 0x00, 0x11, 0xc0];
        bytes.extend(std::iter::repeat(0x05).take(17));
        let values: Vec<Result<Value>> = decoder.decode_array_stream(bytewise(&bytes)).collect().await;
        assert_eq!(values.len(), 17);

        let values: Vec<Result<Value>> = decoder
            .decode_array_stream(chunks(&[&[0x90, 0xc0]]))
            .collect()
            .await;
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn array_stream_rejects_other_inputs() {
        let decoder = Decoder::new(plain_unpack());

        let mut stream = decoder.decode_array_stream(chunks(&[&[0x80, 0xc0]]));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::NotAnArray { byte: 0x80, offset: 0 }));
        assert!(stream.next().await.is_none());

        let mut stream = decoder.decode_array_stream(chunks(&[&[0x91, 0xa1, b't', 0x01]]));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::TaggedArrayStream { offset: 1 }));

        let mut stream = decoder.decode_array_stream(chunks(&[&[0x92, 0xc0, 0x01]]));
        assert_eq!(stream.next().await.unwrap().unwrap(), Value::Int(1));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::Insufficient { offset: 3 }));
        assert!(stream.next().await.is_none());
    }
}
