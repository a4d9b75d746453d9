use crate::error::{ClientError, Result};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use lodestar_core::WatchEvent;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::pin::Pin;

/// Stream of decoded watch events
pub type WatchStream<T> = Pin<Box<dyn Stream<Item = Result<WatchEvent<T>>> + Send>>;

/// Splits a chunked HTTP body into newline-delimited JSON documents
struct LineDecoder<S> {
    body: Pin<Box<S>>,
    buffer: BytesMut,
    done: bool,
}

impl<S> LineDecoder<S> {
    /// Pop the next complete line from the buffer, without the newline
    fn next_line(&mut self) -> Option<Bytes> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos);
        Some(line.freeze())
    }

    /// Whatever is left once the body has ended
    fn take_remainder(&mut self) -> Option<Bytes> {
        let rest = self.buffer.split().freeze();
        (!is_blank(&rest)).then_some(rest)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<WatchEvent<T>> {
    serde_json::from_slice(line).map_err(|e| ClientError::decode("watch event", e.to_string()))
}

/// Turn a raw watch response body into a stream of events.
///
/// Events may be split across chunks or share one chunk. The stream yields
/// at most one error (decode or transport) and then ends.
pub fn decode_watch_stream<T, S, E>(body: S) -> WatchStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let decoder = LineDecoder {
        body: Box::pin(body),
        buffer: BytesMut::new(),
        done: false,
    };

    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        loop {
            if decoder.done {
                return None;
            }

            if let Some(line) = decoder.next_line() {
                if is_blank(&line) {
                    continue;
                }
                let item = decode_line::<T>(&line);
                decoder.done = item.is_err();
                return Some((item, decoder));
            }

            match decoder.body.next().await {
                Some(Ok(chunk)) => decoder.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    decoder.done = true;
                    let err = ClientError::transport("watch pods", e.to_string());
                    return Some((Err(err), decoder));
                }
                None => {
                    decoder.done = true;
                    let rest = decoder.take_remainder()?;
                    return Some((decode_line::<T>(&rest), decoder));
                }
            }
        }
    }))
}
