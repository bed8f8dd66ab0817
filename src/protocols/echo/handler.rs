//! Echo connection handler.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tracing::{debug, trace};

use crate::config::{Config, EchoMode, FramingType};
use crate::framing::{Frame, FrameReader, LengthPrefixedReader, LineReader};

/// Per-connection handler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoOptions {
    pub mode: EchoMode,
    pub framing: FramingType,
    /// Longest line accepted; for length framing, the largest payload.
    pub max_line_length: usize,
}

impl Default for EchoOptions {
    fn default() -> Self {
        Self {
            mode: EchoMode::Plain,
            framing: FramingType::Line,
            max_line_length: 64 * 1024,
        }
    }
}

impl From<&Config> for EchoOptions {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.mode,
            framing: config.framing,
            max_line_length: config.max_line_length,
        }
    }
}

/// Why the echo loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side.
    Eof,
    /// Reading failed (including framing violations).
    ReadError(String),
    /// Writing a line back failed.
    WriteError(String),
}

/// What a finished connection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoSummary {
    /// Lines echoed back.
    pub lines: u64,
    /// Bytes echoed back.
    pub bytes: u64,
    pub close_reason: CloseReason,
    /// Everything echoed, in order. Only set in `EchoMode::Accumulate`.
    pub transcript: Option<BytesMut>,
}

/// Handle an echo connection.
///
/// Reads one frame at a time and writes it straight back, flushing after
/// every frame. The stream is owned by the handler and closed exactly once
/// when the loop ends, whatever ended it. Errors never propagate; they are
/// logged and reported in the returned summary.
pub async fn handle_connection<S>(stream: S, options: EchoOptions) -> EchoSummary
where
    S: AsyncRead + AsyncWrite + Send,
{
    let (reader, mut writer) = tokio::io::split(stream);

    let summary = match options.framing {
        FramingType::Line => {
            let mut frames = LineReader::new(reader, options.max_line_length);
            echo_frames(&mut frames, &mut writer, options.mode).await
        }
        FramingType::Length => {
            let mut frames = LengthPrefixedReader::new(reader, options.max_line_length);
            echo_frames(&mut frames, &mut writer, options.mode).await
        }
    };

    if let Err(e) = writer.shutdown().await {
        trace!(error = %e, "Shutdown after echo loop failed");
    }

    summary
}

/// The echo loop, independent of framing.
async fn echo_frames<R, S>(
    frames: &mut R,
    writer: &mut WriteHalf<S>,
    mode: EchoMode,
) -> EchoSummary
where
    R: FrameReader,
    S: AsyncRead + AsyncWrite + Send,
{
    let mut transcript = match mode {
        EchoMode::Plain => None,
        EchoMode::Accumulate => Some(BytesMut::new()),
    };
    let mut lines = 0u64;
    let mut bytes = 0u64;

    let close_reason = loop {
        let frame = match frames.read_frame().await {
            Ok(Frame::Data(frame)) => frame,
            Ok(Frame::End) => {
                trace!("Connection closed by client");
                break CloseReason::Eof;
            }
            Err(e) => {
                debug!(error = %e, "Read failed");
                break CloseReason::ReadError(e.to_string());
            }
        };

        if let Err(e) = write_frame(writer, &frame).await {
            debug!(error = %e, "Write failed");
            break CloseReason::WriteError(e.to_string());
        }

        // Only bytes that made it back to the peer are recorded.
        if let Some(transcript) = transcript.as_mut() {
            transcript.extend_from_slice(&frame);
        }

        trace!(len = frame.len(), "Echoed line");
        lines += 1;
        bytes += frame.len() as u64;
    };

    EchoSummary {
        lines,
        bytes,
        close_reason,
        transcript,
    }
}

async fn write_frame<W>(writer: &mut W, frame: &Bytes) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
