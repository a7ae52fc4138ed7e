//! # Job Queue and Job Lifecycle
//!
//! A node's queue holds a FIFO list of [`Job`]s, each an in-flight request,
//! response, transfer, or forwarding action. `JobKind` is a tagged union
//! (spec §9's "tagged variants... eliminate the which-fields-are-valid
//! ambiguity" redesign flag) rather than one struct with a grab-bag of
//! optional fields: a `Transmit` job only ever carries file-transfer state,
//! a `ForwardPkt` job only ever carries a packet and an egress port, and so
//! on.

use crate::packet::{Packet, PacketType};
use crate::ticket::Ticket;
use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;

/// Lifecycle state of a job, advanced each time it is dequeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Ready,
    Complete,
    Error,
}

/// What kind of response a `WaitForResponse` job is holding out for, and
/// what it should do once one arrives (or the wait times out).
#[derive(Debug, Clone)]
pub enum WaitKind {
    Ping,
    UploadHandshake { peer: u8, filename: String },
    DownloadHandshake { peer: u8, filename: String },
    DnsRegister { name: String },
    DnsQuery { name: String, resume: Box<crate::node::host::PendingCommand> },
}

impl WaitKind {
    /// The packet type that satisfies this wait.
    pub fn expected_response(&self) -> PacketType {
        match self {
            WaitKind::Ping => PacketType::PingResponse,
            WaitKind::UploadHandshake { .. } => PacketType::UploadResponse,
            WaitKind::DownloadHandshake { .. } => PacketType::DownloadResponse,
            WaitKind::DnsRegister { .. } => PacketType::DnsRegistrationResponse,
            WaitKind::DnsQuery { .. } => PacketType::DnsQueryResponse,
        }
    }

    /// Operator-facing message surfaced when this wait times out, per spec
    /// §4.3's "type-specific timeout message."
    pub fn timeout_message(&self) -> String {
        match self {
            WaitKind::Ping => "Ping request timed out".to_string(),
            WaitKind::UploadHandshake { .. } => "Upload request timed out".to_string(),
            WaitKind::DownloadHandshake { .. } => "Download request timed out".to_string(),
            WaitKind::DnsRegister { name } => format!("Registration of '{name}' timed out"),
            WaitKind::DnsQuery { name, .. } => format!("Name lookup for '{name}' timed out"),
        }
    }
}

/// Which operator-facing flow a transfer belongs to, purely so the
/// completion/timeout messages can say "Upload" or "Download" correctly
/// once the two flows share the same job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Upload,
    Download,
}

/// State of an in-progress chunked file transfer, used by both the upload
/// sender/download responder (`Transmit`) and the upload receiver/download
/// requester (`Receive`) job kinds, since per spec §4.3 download is
/// "semantically a reversed upload."
#[derive(Debug)]
pub struct FileTransfer {
    pub peer: u8,
    pub path: PathBuf,
    pub offset: u64,
    pub handle: Option<File>,
    pub op: TransferOp,
}

impl FileTransfer {
    pub fn new(peer: u8, path: PathBuf, op: TransferOp) -> Self {
        Self {
            peer,
            path,
            offset: 0,
            handle: None,
            op,
        }
    }
}

/// A unit of work in a node's queue.
#[derive(Debug)]
pub enum JobKind {
    /// Send a single packet once, no response expected or tracked here.
    SendPacket(Packet),
    /// Waiting for a response packet matching this job's ticket.
    WaitForResponse(WaitKind),
    /// Actively streaming file chunks to `file.peer`.
    Transmit(FileTransfer),
    /// Actively accumulating file chunks from `file.peer`.
    Receive(FileTransfer),
    /// Switch-only: flood a packet on every in-tree port but the ingress.
    BroadcastPkt { packet: Packet, ingress: Option<usize> },
    /// Switch-only: send a packet out the single learned egress port.
    ForwardPkt { packet: Packet, out_port: usize },
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::SendPacket(_) => "SendPacket",
            JobKind::WaitForResponse(_) => "WaitForResponse",
            JobKind::Transmit(_) => "Transmit",
            JobKind::Receive(_) => "Receive",
            JobKind::BroadcastPkt { .. } => "BroadcastPkt",
            JobKind::ForwardPkt { .. } => "ForwardPkt",
        }
    }
}

/// An in-flight unit of work owned exclusively by the queue that holds it.
#[derive(Debug)]
pub struct Job {
    pub ticket: Ticket,
    pub state: JobState,
    pub ttl: u32,
    pub kind: JobKind,
    pub error_msg: Option<String>,
}

impl Job {
    pub fn new(ticket: Ticket, ttl: u32, kind: JobKind) -> Self {
        Self {
            ticket,
            state: JobState::Pending,
            ttl,
            kind,
            error_msg: None,
        }
    }

    pub fn fail(&mut self, msg: impl Into<String>) {
        self.state = JobState::Error;
        self.error_msg = Some(msg.into());
    }
}

/// First-in-first-out queue of jobs, single-producer/single-consumer from
/// its owning node's own loop (spec §4.2: "no cross-thread access").
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn length(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn find_by_ticket(&mut self, ticket: Ticket) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.ticket == ticket)
    }

    pub fn delete_by_ticket(&mut self, ticket: Ticket) -> Option<Job> {
        let idx = self.jobs.iter().position(|j| j.ticket == ticket)?;
        self.jobs.remove(idx)
    }

    pub fn has_ticket(&self, ticket: Ticket) -> bool {
        self.jobs.iter().any(|j| j.ticket == ticket)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    fn dummy_packet() -> Packet {
        Packet::with_text(1, 2, PacketType::PingReq, "0001:").unwrap()
    }

    #[test]
    fn fifo_order() {
        let mut q = JobQueue::new();
        q.enqueue(Job::new(Ticket::new(1), 5, JobKind::SendPacket(dummy_packet())));
        q.enqueue(Job::new(Ticket::new(2), 5, JobKind::SendPacket(dummy_packet())));
        assert_eq!(q.length(), 2);
        assert_eq!(q.dequeue().unwrap().ticket, Ticket::new(1));
        assert_eq!(q.dequeue().unwrap().ticket, Ticket::new(2));
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn find_and_delete_by_ticket() {
        let mut q = JobQueue::new();
        q.enqueue(Job::new(Ticket::new(7), 5, JobKind::SendPacket(dummy_packet())));
        assert!(q.find_by_ticket(Ticket::new(7)).is_some());
        assert!(q.find_by_ticket(Ticket::new(8)).is_none());
        let removed = q.delete_by_ticket(Ticket::new(7));
        assert!(removed.is_some());
        assert_eq!(q.length(), 0);
    }
}
