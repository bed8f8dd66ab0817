//! Frame readers.
//!
//! A frame reader has one capability: pull the next frame off a byte
//! stream, or report that the stream has ended. The echo handler only
//! ever sees [`Frame`]s, so switching from newline lines to another
//! framing leaves its control flow untouched.
//!
//! ## Readers
//! - `line`: `\n`-terminated lines (the default echo wire format)
//! - `length`: `<length>\r\n<data>` frames
//!
//! Both readers hand back the frame exactly as it appeared on the wire,
//! delimiters and headers included, so echoing a frame is a verbatim
//! write of its bytes.

mod length;
mod line;

pub use length::LengthPrefixedReader;
pub use line::LineReader;

use bytes::Bytes;
use std::future::Future;
use std::io;
use thiserror::Error;

/// Result of a single frame read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete frame, as raw wire bytes.
    Data(Bytes),
    /// The stream ended. Any undelimited trailing bytes were dropped.
    End,
}

/// Read one frame at a time from an underlying stream.
pub trait FrameReader {
    /// Read the next frame.
    ///
    /// Returns `Frame::End` on clean end-of-stream. I/O failures and
    /// framing violations are returned as errors; framing violations use
    /// `io::ErrorKind::InvalidData`.
    fn read_frame(&mut self) -> impl Future<Output = io::Result<Frame>> + Send;
}

/// Framing violations detected while reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("frame of {length} bytes exceeds {limit} bytes")]
    FrameTooLarge { length: usize, limit: usize },
    #[error("invalid length")]
    InvalidLength,
}

impl From<FrameError> for io::Error {
    fn from(e: FrameError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}
