//! # Learning Switch
//!
//! A switch forwards application traffic using a source-address learning
//! table (spec §4.4: "learn the ingress port of every frame's source, then
//! forward to a learned destination or flood otherwise") while running the
//! distributed spanning-tree protocol of [`crate::stp`] to keep broadcast
//! floods from looping on a cyclic topology.

use crate::constants::{ALLOWED_CONVERGENCE_ROUNDS, PERIODIC_CTRL_MSG_WAITTIME};
use crate::job::{Job, JobKind, JobQueue};
use crate::packet::{Packet, PacketType};
use crate::port::Port;
use crate::stp::{ControlPayload, SwitchStp};
use crate::ticket::Ticket;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

pub struct SwitchContext {
    pub id: u8,
    ports: Vec<Box<dyn Port>>,
    stp: SwitchStp,
    /// Maps a learned source node id to the ingress port it was last heard
    /// on. Ages never expire in this simulator: the topology is static
    /// once the config file is loaded.
    learned: HashMap<u8, usize>,
    queue: JobQueue,
    next_ctrl_tick: Instant,
}

impl SwitchContext {
    pub fn new(id: u8, ports: Vec<Box<dyn Port>>) -> Self {
        let port_count = ports.len();
        Self {
            id,
            ports,
            stp: SwitchStp::new(id, port_count),
            learned: HashMap::new(),
            queue: JobQueue::new(),
            next_ctrl_tick: Instant::now(),
        }
    }

    /// Current per-port spanning-tree membership, exposed read-only for
    /// diagnostics and tests (spec §8's "set of in-tree ports... forms a
    /// spanning tree" invariant).
    pub fn port_in_tree(&self) -> &[bool] {
        &self.stp.port_in_tree
    }

    pub async fn run(mut self) {
        loop {
            self.tick().await;
            tokio::time::sleep(crate::constants::LOOP_SLEEP).await;
        }
    }

    /// One iteration of spec §2's per-tick data flow, without the trailing
    /// sleep quantum. Exposed so tests can drive convergence deterministically
    /// without waiting on `run`'s infinite loop to hand `self` back.
    pub async fn tick(&mut self) {
        self.maybe_broadcast_stp().await;

        for i in 0..self.ports.len() {
            match self.ports[i].try_recv().await {
                Ok(Some(pkt)) => self.handle_packet(i, pkt),
                Ok(None) => {}
                Err(e) => debug!(switch = self.id, port = i, error = %e, "transport error on port"),
            }
        }

        if let Some(job) = self.queue.dequeue() {
            self.advance_job(job).await;
        }
    }

    async fn maybe_broadcast_stp(&mut self) {
        if Instant::now() < self.next_ctrl_tick {
            return;
        }
        self.next_ctrl_tick = Instant::now() + PERIODIC_CTRL_MSG_WAITTIME;
        if !self.stp.should_broadcast(ALLOWED_CONVERGENCE_ROUNDS) {
            return;
        }
        self.stp.record_broadcast_round();
        for port in 0..self.ports.len() {
            let payload = self.stp.outgoing_payload(port).format();
            if let Ok(pkt) = Packet::with_text(self.id, 255, PacketType::Control, &payload) {
                let _ = self.ports[port].send(&pkt).await;
            }
        }
    }

    fn handle_packet(&mut self, ingress: usize, pkt: Packet) {
        if pkt.ty == PacketType::Control {
            if let Ok(payload) = ControlPayload::parse(pkt.text().unwrap_or_default()) {
                self.stp.handle_control(ingress, pkt.src, &payload);
                trace!(switch = self.id, root = self.stp.root_id, dist = self.stp.root_dist, "stp state updated");
            }
            return;
        }

        self.learned.insert(pkt.src, ingress);

        if pkt.dst != 255 {
            if let Some(&out_port) = self.learned.get(&pkt.dst) {
                if out_port != ingress {
                    self.queue.enqueue(Job::new(
                        Ticket::new(0),
                        0,
                        JobKind::ForwardPkt { packet: pkt, out_port },
                    ));
                }
                return;
            }
        }

        self.queue.enqueue(Job::new(
            Ticket::new(0),
            0,
            JobKind::BroadcastPkt {
                packet: pkt,
                ingress: Some(ingress),
            },
        ));
    }

    async fn advance_job(&mut self, job: Job) {
        match job.kind {
            JobKind::ForwardPkt { packet, out_port } => {
                if let Some(port) = self.ports.get_mut(out_port) {
                    let _ = port.send(&packet).await;
                }
            }
            JobKind::BroadcastPkt { packet, ingress } => {
                for (i, port) in self.ports.iter_mut().enumerate() {
                    if Some(i) == ingress {
                        continue;
                    }
                    if !self.stp.port_in_tree.get(i).copied().unwrap_or(true) {
                        continue;
                    }
                    let _ = port.send(&packet).await;
                }
            }
            _ => {
                // Application/DNS job kinds never appear on a switch.
            }
        }
    }
}
