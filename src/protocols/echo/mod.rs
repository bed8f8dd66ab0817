//! Echo protocol implementation.
//!
//! Every line a client sends is written straight back, delimiter included:
//!
//! ```text
//! Request:  ping\n
//! Response: ping\n
//! ```
//!
//! ## Behavior
//!
//! - Each line is flushed back as soon as it is read; nothing is batched.
//! - A trailing fragment without `\n` is never echoed. When the client
//!   closes, the fragment is dropped and the connection ends.
//! - A line longer than the configured limit ends the connection without
//!   being echoed.
//! - In `accumulate` mode the handler also keeps a transcript of every
//!   echoed line and returns it when the connection ends.
//!
//! The handler is generic over the stream, so it runs the same against a
//! `TcpStream` or an in-memory `tokio::io::duplex` pipe.

pub mod handler;

pub use handler::{handle_connection, CloseReason, EchoOptions, EchoSummary};
