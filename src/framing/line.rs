//! Newline-delimited frame reader.

use super::{Frame, FrameError, FrameReader};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Initial read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Parse result for a single line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParseResult {
    /// A line of this many bytes (delimiter included) is at the front.
    Complete(usize),
    /// No delimiter yet.
    Incomplete,
    /// The line at the front can never fit within the limit.
    TooLong,
}

/// Locate the first line in `input`.
///
/// `max_len` bounds the line length including its `\n`.
pub(crate) fn parse(input: &[u8], max_len: usize) -> ParseResult {
    match input.iter().position(|&b| b == b'\n') {
        Some(pos) if pos < max_len => ParseResult::Complete(pos + 1),
        Some(_) => ParseResult::TooLong,
        None if input.len() >= max_len => ParseResult::TooLong,
        None => ParseResult::Incomplete,
    }
}

/// Reads `\n`-terminated lines from an async reader.
///
/// A fragment left in the buffer when the stream ends is never returned
/// as a line; it is dropped and the read reports [`Frame::End`].
pub struct LineReader<R> {
    reader: R,
    buffer: BytesMut,
    max_line_length: usize,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(BUFFER_SIZE.min(max_line_length.max(1))),
            max_line_length: max_line_length.max(1),
        }
    }
}

impl<R> FrameReader for LineReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> io::Result<Frame> {
        loop {
            match parse(&self.buffer, self.max_line_length) {
                ParseResult::Complete(len) => {
                    return Ok(Frame::Data(self.buffer.split_to(len).freeze()));
                }
                ParseResult::TooLong => {
                    return Err(FrameError::LineTooLong {
                        limit: self.max_line_length,
                    }
                    .into());
                }
                ParseResult::Incomplete => {}
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    debug!(discarded = self.buffer.len(), "Dropping undelimited trailing bytes");
                    self.buffer.clear();
                }
                return Ok(Frame::End);
            }
        }
    }
}
