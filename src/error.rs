//! Error types for the simulator core.
//!
//! Module boundaries return [`NetsimError`] so callers can match on the
//! specific failure kind from spec §7 (transport, malformed packet,
//! protocol refusal, timeout, configuration). The binary entry point widens
//! everything to `anyhow::Error` the same way the teacher crate's
//! `IpcError` gets folded into `anyhow` at its outermost layer.

use thiserror::Error;

/// Errors raised by the port/transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port send/recv failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer connection address did not match the expected remote")]
    PeerMismatch,

    #[error("port buffer is full")]
    Busy,

    #[error("port was closed")]
    Closed,
}

/// Errors raised by the simulator's node and application-protocol layers.
#[derive(Debug, Error)]
pub enum NetsimError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed packet payload: {0}")]
    Malformed(String),

    #[error("request refused: {0}")]
    Protocol(String),

    #[error("request timed out")]
    Timeout,

    #[error("configuration error: {0}")]
    Config(String),
}
