//! # Port Abstraction
//!
//! A [`Port`] is the one seam the rest of the simulator depends on: a
//! bidirectional, non-blocking endpoint of a link, owned by exactly one
//! node. Everything above this trait — the node runtime, the switch
//! plane, the application protocol — is transport-agnostic; everything
//! below it (pipes, TCP sockets) is free to vary.
//!
//! Two implementations are provided, grounded on the teacher crate's
//! per-mechanism transport modules: [`pipe::PipePort`] (an in-process
//! channel pair, standing in for the original's anonymous pipes) and
//! [`tcp::TcpPort`] (a real `tokio::net::TcpStream`-backed socket).

pub mod pipe;
pub mod tcp;

use crate::error::TransportError;
use crate::packet::Packet;
use async_trait::async_trait;

pub use pipe::PipePort;
pub use tcp::TcpPort;

/// Which transport backs a port, mirroring the `(P|S)` link-type tag in the
/// configuration file grammar (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Pipe,
    Tcp,
}

/// A bidirectional, non-blocking link endpoint.
///
/// `try_recv` never awaits arrival of data; it polls once and returns
/// immediately. `send` is best-effort: a `Busy` error means the caller
/// retains ownership of the packet and may retry on a later tick.
#[async_trait]
pub trait Port: Send {
    fn kind(&self) -> PortKind;

    /// The remote node id this port connects to, when known.
    fn peer(&self) -> Option<u8>;

    /// Poll once for an available frame. `Ok(None)` means nothing has
    /// arrived yet, not an error.
    async fn try_recv(&mut self) -> Result<Option<Packet>, TransportError>;

    /// Attempt to deliver a packet. `Err(TransportError::Busy)` means the
    /// send was not accepted and the caller should retry later.
    async fn send(&mut self, pkt: &Packet) -> Result<(), TransportError>;
}
