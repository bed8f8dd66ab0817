//! Protocol implementations.
//!
//! Each protocol has a connection handler used by the server.
//!
//! - `echo`: writes every received line straight back

pub mod echo;
