//! In-process pipe port, backed by a pair of bounded `tokio::sync::mpsc`
//! channels. Stands in for the original simulator's anonymous pipes: two
//! nodes in the same process each hold one end of a [`PipePort`] pair and
//! exchange already-encoded frames.

use super::{Port, PortKind};
use crate::error::TransportError;
use crate::packet::Packet;
use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

/// Depth of the channel backing a pipe link. Matches the "best-effort,
/// possibly partially accepted" send semantics of spec §4.1: once this
/// many frames are queued, `send` reports `Busy` rather than blocking.
const PIPE_CAPACITY: usize = 64;

pub struct PipePort {
    peer: u8,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl PipePort {
    /// Build both ends of a pipe link between `a` and `b`.
    pub fn pair(a_id: u8, b_id: u8) -> (PipePort, PipePort) {
        let (tx_a, rx_b) = tokio::sync::mpsc::channel(PIPE_CAPACITY);
        let (tx_b, rx_a) = tokio::sync::mpsc::channel(PIPE_CAPACITY);
        (
            PipePort {
                peer: b_id,
                tx: tx_a,
                rx: rx_a,
            },
            PipePort {
                peer: a_id,
                tx: tx_b,
                rx: rx_b,
            },
        )
    }
}

#[async_trait]
impl Port for PipePort {
    fn kind(&self) -> PortKind {
        PortKind::Pipe
    }

    fn peer(&self) -> Option<u8> {
        Some(self.peer)
    }

    async fn try_recv(&mut self) -> Result<Option<Packet>, TransportError> {
        match self.rx.try_recv() {
            Ok(bytes) => Ok(Some(
                Packet::decode(&bytes).map_err(|_| TransportError::Closed)?,
            )),
            Err(tokio::sync::mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
                Err(TransportError::Closed)
            }
        }
    }

    async fn send(&mut self, pkt: &Packet) -> Result<(), TransportError> {
        self.tx
            .try_send(pkt.encode())
            .map_err(|e| match e {
                tokio::sync::mpsc::error::TrySendError::Full(_) => TransportError::Busy,
                tokio::sync::mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    #[tokio::test]
    async fn delivers_in_order() {
        let (mut a, mut b) = PipePort::pair(1, 2);
        let p1 = Packet::with_text(1, 2, PacketType::PingReq, "0001:").unwrap();
        let p2 = Packet::with_text(1, 2, PacketType::PingReq, "0002:").unwrap();
        a.send(&p1).await.unwrap();
        a.send(&p2).await.unwrap();
        let r1 = b.try_recv().await.unwrap().unwrap();
        let r2 = b.try_recv().await.unwrap().unwrap();
        assert_eq!(r1.text().unwrap(), "0001:");
        assert_eq!(r2.text().unwrap(), "0002:");
        assert!(b.try_recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn peer_ids_are_swapped_ends() {
        let (a, b) = PipePort::pair(1, 2);
        assert_eq!(a.peer(), Some(2));
        assert_eq!(b.peer(), Some(1));
    }
}
