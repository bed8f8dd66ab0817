//! Length-prefixed frame reader.
//!
//! Frames use a decimal length header followed by exactly that many bytes:
//!
//! ```text
//! Frame:    <length>\r\n<data of exactly length bytes>
//!
//! Example:  5\r\nhello
//! ```
//!
//! The reader returns the whole frame, header included, so an echo of the
//! frame is itself a valid frame.

use super::{Frame, FrameError, FrameReader};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Longest header accepted (`usize::MAX` has 20 digits, plus `\r\n`).
const MAX_HEADER_LEN: usize = 22;

/// Read buffer size
const BUFFER_SIZE: usize = 8 * 1024;

/// Parse result for a frame header.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParseResult {
    /// Header parsed; data follows.
    Complete {
        /// Length of data following the header.
        length: usize,
        /// Bytes consumed by the header (length + \r\n).
        header_len: usize,
    },
    /// Need more data for header.
    Incomplete,
    /// Invalid length format.
    InvalidLength,
}

/// Parse a frame header from the input buffer.
///
/// The caller must check that `header_len + length` bytes are buffered
/// before taking the frame.
pub(crate) fn parse(input: &[u8]) -> ParseResult {
    let line_end = match find_crlf(input) {
        Some(pos) => pos,
        None if input.len() >= MAX_HEADER_LEN => return ParseResult::InvalidLength,
        None => return ParseResult::Incomplete,
    };

    let line = &input[..line_end];
    if line.is_empty() || !line.iter().all(u8::is_ascii_digit) {
        return ParseResult::InvalidLength;
    }

    let length: usize = match std::str::from_utf8(line).ok().and_then(|s| s.parse().ok()) {
        Some(len) => len,
        None => return ParseResult::InvalidLength,
    };

    ParseResult::Complete {
        length,
        header_len: line_end + 2,
    }
}

/// Find \r\n in buffer, returning the position of \r.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}

/// Reads `<length>\r\n<data>` frames from an async reader.
pub struct LengthPrefixedReader<R> {
    reader: R,
    buffer: BytesMut,
    max_frame_size: usize,
}

impl<R> LengthPrefixedReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// `max_frame_size` bounds the data portion of a frame.
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
            max_frame_size,
        }
    }
}

impl<R> FrameReader for LengthPrefixedReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> io::Result<Frame> {
        loop {
            match parse(&self.buffer) {
                ParseResult::Complete { length, header_len } => {
                    if length > self.max_frame_size {
                        return Err(FrameError::FrameTooLarge {
                            length,
                            limit: self.max_frame_size,
                        }
                        .into());
                    }
                    let total = header_len + length;
                    if self.buffer.len() >= total {
                        return Ok(Frame::Data(self.buffer.split_to(total).freeze()));
                    }
                    self.buffer.reserve(total - self.buffer.len());
                }
                ParseResult::InvalidLength => return Err(FrameError::InvalidLength.into()),
                ParseResult::Incomplete => {}
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    debug!(discarded = self.buffer.len(), "Dropping incomplete trailing frame");
                    self.buffer.clear();
                }
                return Ok(Frame::End);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_parse_header() {
        match parse(b"100\r\n") {
            ParseResult::Complete { length, header_len } => {
                assert_eq!(length, 100);
                assert_eq!(header_len, 5);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_incomplete() {
        match parse(b"100") {
            ParseResult::Incomplete => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_length() {
        match parse(b"abc\r\n") {
            ParseResult::InvalidLength => {}
            other => panic!("unexpected: {:?}", other),
        }
        match parse(b"-1\r\n") {
            ParseResult::InvalidLength => {}
            other => panic!("unexpected: {:?}", other),
        }
        match parse(b"\r\n") {
            ParseResult::InvalidLength => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_runaway_header() {
        match parse(b"12345678901234567890123") {
            ParseResult::InvalidLength => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_whole_frames() {
        let mock = tokio_test::io::Builder::new()
            .read(b"5\r\nhel")
            .read(b"lo0\r\n3\r\n")
            .read(b"a\nb")
            .build();
        let mut reader = LengthPrefixedReader::new(mock, 1024);

        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::Data(Bytes::from_static(b"5\r\nhello"))
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::Data(Bytes::from_static(b"0\r\n"))
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            Frame::Data(Bytes::from_static(b"3\r\na\nb"))
        );
        assert_eq!(reader.read_frame().await.unwrap(), Frame::End);
    }

    #[tokio::test]
    async fn test_truncated_frame_ends_stream() {
        let mut reader = LengthPrefixedReader::new(&b"10\r\nshort"[..], 1024);
        assert_eq!(reader.read_frame().await.unwrap(), Frame::End);
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let mut reader = LengthPrefixedReader::new(&b"4096\r\n"[..], 1024);

        let err = reader.read_frame().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
