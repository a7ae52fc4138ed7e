//! # Spanning Tree Control Plane
//!
//! Shared control-packet payload and per-switch tree state for the
//! distributed spanning-tree protocol of spec §4.4. Hosts and the name
//! server also emit periodic control packets as STP leaves, but only a
//! switch's view of `root_id`/`root_dist`/`parent_port` ever changes in
//! response to what it hears, so the mutable [`SwitchStp`] state lives
//! here while leaf emission is a couple of lines inline in
//! [`crate::node::host`] and [`crate::node::nameserver`].

use crate::constants::CONTROL_TICKET;
use crate::error::NetsimError;

/// Which role emitted a control packet, carried in the payload so a
/// receiving switch knows whether to run root-election logic at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderKind {
    Switch,
    Host,
    NameServer,
}

impl SenderKind {
    fn to_char(self) -> char {
        match self {
            SenderKind::Switch => 'S',
            SenderKind::Host => 'H',
            SenderKind::NameServer => 'D',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'S' => Some(SenderKind::Switch),
            'H' => Some(SenderKind::Host),
            'D' => Some(SenderKind::NameServer),
            _ => None,
        }
    }
}

/// The decoded body of a `CONTROL` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPayload {
    pub root_id: u8,
    pub root_dist: u32,
    pub sender_kind: SenderKind,
    /// `true` iff the sender considers this link its own parent link,
    /// i.e. the sender is a child of the node on the other end.
    pub is_child: bool,
}

impl ControlPayload {
    pub fn format(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            CONTROL_TICKET,
            self.root_id,
            self.root_dist,
            self.sender_kind.to_char(),
            if self.is_child { 'Y' } else { 'N' }
        )
    }

    pub fn parse(text: &str) -> Result<Self, NetsimError> {
        let bad = || NetsimError::Malformed(format!("malformed control payload '{text}'"));
        let mut parts = text.split(':');
        let ticket = parts.next().ok_or_else(bad)?;
        if ticket != CONTROL_TICKET {
            return Err(bad());
        }
        let root_id: u8 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let root_dist: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let sender_kind = SenderKind::from_char(
            parts.next().ok_or_else(bad)?.chars().next().ok_or_else(bad)?,
        )
        .ok_or_else(bad)?;
        let is_child = match parts.next().ok_or_else(bad)? {
            "Y" => true,
            "N" => false,
            _ => return Err(bad()),
        };
        Ok(Self {
            root_id,
            root_dist,
            sender_kind,
            is_child,
        })
    }
}

/// A switch's view of the spanning tree: which node it believes is root,
/// how far away, through which port, and which ports are currently
/// considered part of the broadcast tree.
#[derive(Debug)]
pub struct SwitchStp {
    self_id: u8,
    pub root_id: u8,
    pub root_dist: u32,
    pub parent_port: Option<usize>,
    pub port_in_tree: Vec<bool>,
    rounds_sent: u32,
}

impl SwitchStp {
    pub fn new(self_id: u8, port_count: usize) -> Self {
        Self {
            self_id,
            root_id: self_id,
            root_dist: 0,
            parent_port: None,
            port_in_tree: vec![true; port_count],
            rounds_sent: 0,
        }
    }

    /// Whether this switch should still be emitting periodic control
    /// packets, per the `ALLOWED_CONVERGENCE_ROUNDS` cap (spec §4.4).
    pub fn should_broadcast(&self, max_rounds: u32) -> bool {
        self.rounds_sent < max_rounds
    }

    pub fn record_broadcast_round(&mut self) {
        self.rounds_sent += 1;
    }

    /// Apply an inbound control packet heard on `port` from neighbor
    /// `neighbor_id`, updating root/parent/port-tree state per spec §4.4.
    pub fn handle_control(&mut self, port: usize, neighbor_id: u8, payload: &ControlPayload) {
        if payload.sender_kind != SenderKind::Switch {
            // Leaves (hosts, the name server) are always reachable.
            self.port_in_tree[port] = true;
            return;
        }

        if payload.root_id < self.root_id {
            self.root_id = payload.root_id;
            self.parent_port = Some(port);
            self.root_dist = payload.root_dist + 1;
        } else if payload.root_id == self.root_id {
            let candidate_dist = payload.root_dist + 1;
            let better = candidate_dist < self.root_dist;
            let tie = candidate_dist == self.root_dist
                && self.parent_port.map_or(true, |pp| port < pp);
            if better || tie {
                self.parent_port = Some(port);
                self.root_dist = candidate_dist;
            }
        }

        self.port_in_tree[port] = if payload.is_child {
            true
        } else {
            // Documented tie-breaker (spec §9 open question, pinned as
            // written): keep the link only if the neighbor is closer to
            // the root than we are, and the neighbor's id is smaller.
            payload.root_dist < self.root_dist && neighbor_id < self.self_id
        };
    }

    /// Build the control payload this switch should emit on `port`.
    pub fn outgoing_payload(&self, port: usize) -> ControlPayload {
        ControlPayload {
            root_id: self.root_id,
            root_dist: self.root_dist,
            sender_kind: SenderKind::Switch,
            is_child: self.parent_port == Some(port),
        }
    }
}
