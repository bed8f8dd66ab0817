//! line-echo: a line-oriented echo handler and signal-triggered callbacks.
//!
//! - [`protocols::echo`]: per-connection line echo over any async stream
//! - [`signal`]: run a callback once a one-shot notification fires
//! - [`framing`]: the frame readers the echo handler is built on
//! - [`server`]: TCP accept loop with graceful shutdown

pub mod config;
pub mod framing;
pub mod protocols;
pub mod server;
pub mod signal;
