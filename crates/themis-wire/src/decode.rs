//! Frame decoder for the newline-delimited `data: ` record stream

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    events::StreamEvent,
};

/// Marker that makes a line significant. Lines without it are discarded.
pub const DATA_PREFIX: &str = "data: ";

/// Incremental decoder for one connection.
///
/// Bytes are pushed in whatever chunks the transport delivers; complete lines
/// are pulled out one event at a time with [`FrameDecoder::next_frame`]. A
/// trailing partial line stays buffered until more bytes arrive.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Offset into `buffer` already known to contain no newline
    scanned: usize,
    /// Number of complete lines consumed so far
    line: usize,
    failed: bool,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pull the next significant event out of the buffered bytes.
    ///
    /// Returns `Ok(None)` when no complete significant line is buffered. After
    /// an error the decoder is poisoned and yields nothing further.
    pub fn next_frame(&mut self) -> Result<Option<StreamEvent>> {
        if self.failed {
            return Ok(None);
        }

        while let Some(end) = self.find_newline() {
            self.line += 1;
            let parsed = parse_line(&self.buffer[..end], self.line);
            self.buffer.drain(..=end);
            self.scanned = 0;

            match parsed {
                None => continue,
                Some(Ok(event)) => {
                    tracing::debug!("Decoded {} frame on line {}", event.kind(), self.line);
                    return Ok(Some(event));
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        Ok(None)
    }

    /// Bytes received but not yet terminated by a newline
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of complete lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// End of data: whatever partial line is left can never complete.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                "Discarding {} unterminated bytes at end of stream",
                self.buffer.len()
            );
            self.buffer.clear();
            self.scanned = 0;
        }
    }

    fn find_newline(&mut self) -> Option<usize> {
        match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => Some(self.scanned + offset),
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }
}

/// Parse one line without its `\n`. `None` for lines that are not records;
/// only record payloads have to be valid UTF-8.
fn parse_line(raw: &[u8], line: usize) -> Option<Result<StreamEvent>> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let payload = raw.strip_prefix(DATA_PREFIX.as_bytes())?;
    let Ok(payload) = std::str::from_utf8(payload) else {
        return Some(Err(Error::InvalidUtf8 { line }));
    };
    Some(serde_json::from_str(payload).map_err(|source| Error::Decode { line, source }))
}

/// Decode a chunked byte stream into events.
///
/// The returned stream ends after the first error, whether it came from the
/// transport or from a malformed record; nothing after that point is yielded.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => decoder.push(chunk.as_ref()),
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }

            loop {
                match decoder.next_frame() {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Stopping stream: {}", e);
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        decoder.finish();
    }
}
