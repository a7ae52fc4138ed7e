//! # Host Runtime — Application Protocol
//!
//! A host is a leaf node that accepts operator commands over its
//! management channel and drives ping, upload, download, and name-service
//! exchanges per spec §4.3. Like the switch and name server, it still
//! participates in STP as a leaf (spec §4.4) so switches attached to it
//! always treat its port as in-tree.

use crate::constants::{
    ALLOWED_CONVERGENCE_ROUNDS, DEFAULT_TTL, MAX_NAME_LEN, MAX_RESPONSE_LEN, PERIODIC_CTRL_MSG_WAITTIME,
    STATIC_DNS_ID,
};
use crate::error::NetsimError;
use crate::job::{FileTransfer, Job, JobKind, JobQueue, JobState, TransferOp, WaitKind};
use crate::packet::{Packet, PacketType};
use crate::port::Port;
use crate::stp::{ControlPayload, SenderKind};
use crate::ticket::{
    format_with_ticket, format_with_ticket_bytes, split_ticket, split_ticket_bytes, Ticket,
    TicketAllocator,
};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A ping/upload/download/registration destination, as typed by the
/// operator: either a raw node id or a domain name to resolve first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dest {
    Id(u8),
    Name(String),
}

/// An operator command parsed off the management channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Status,
    SetDir(String),
    Help,
    Ping(Dest),
    Upload(Dest, String),
    Download(Dest, String),
    Register(String),
}

/// A command whose destination name has not resolved yet; stashed inside a
/// `DnsQuery` job and replayed once the lookup completes (spec §4.3: "the
/// host... re-queues the original command when the reply lands").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    Ping(Dest),
    Upload(Dest, String),
    Download(Dest, String),
}

/// Parse one management-channel command line (spec §4.3 letter commands).
pub fn parse_command(line: &str) -> Result<HostCommand, NetsimError> {
    let mut parts = line.trim().split_whitespace();
    let letter = parts
        .next()
        .ok_or_else(|| NetsimError::Malformed("empty command".into()))?;
    let bad_args = || NetsimError::Malformed(format!("'{letter}' missing required argument(s)"));
    match letter {
        "s" => Ok(HostCommand::Status),
        "h" => Ok(HostCommand::Help),
        "m" => Ok(HostCommand::SetDir(
            parts.next().ok_or_else(bad_args)?.to_string(),
        )),
        "p" => Ok(HostCommand::Ping(parse_dest(parts.next().ok_or_else(bad_args)?))),
        "u" => {
            let dst = parts.next().ok_or_else(bad_args)?;
            let file = parts.next().ok_or_else(bad_args)?;
            Ok(HostCommand::Upload(parse_dest(dst), file.to_string()))
        }
        "d" => {
            let dst = parts.next().ok_or_else(bad_args)?;
            let file = parts.next().ok_or_else(bad_args)?;
            Ok(HostCommand::Download(parse_dest(dst), file.to_string()))
        }
        "a" => Ok(HostCommand::Register(
            parts.next().ok_or_else(bad_args)?.to_string(),
        )),
        other => Err(NetsimError::Malformed(format!("unknown command '{other}'"))),
    }
}

fn parse_dest(token: &str) -> Dest {
    match token.parse::<u8>() {
        Ok(id) => Dest::Id(id),
        Err(_) => Dest::Name(token.to_string()),
    }
}

/// The per-host management channel: commands flow in, operator-facing
/// replies flow out. Stands in for spec §4.6's "bidirectional byte-stream
/// handle to the manager."
pub struct ManLink {
    pub cmd_rx: mpsc::Receiver<String>,
    pub reply_tx: mpsc::Sender<String>,
}

/// All state owned by a host's own loop; never touched from another task.
pub struct HostContext {
    pub id: u8,
    ports: Vec<Box<dyn Port>>,
    queue: JobQueue,
    tickets: TicketAllocator,
    local_dir: Option<PathBuf>,
    name_cache: HashMap<String, u8>,
    man: ManLink,
    rounds_sent: u32,
    next_ctrl_tick: Instant,
}

impl HostContext {
    pub fn new(id: u8, ports: Vec<Box<dyn Port>>, man: ManLink) -> Self {
        Self {
            id,
            ports,
            queue: JobQueue::new(),
            tickets: TicketAllocator::new(),
            local_dir: None,
            name_cache: HashMap::new(),
            man,
            rounds_sent: 0,
            next_ctrl_tick: Instant::now(),
        }
    }

    fn reply(&self, msg: impl Into<String>) {
        let _ = self.man.reply_tx.try_send(msg.into());
    }

    fn new_ticket(&mut self) -> Ticket {
        let queue = &self.queue;
        self.tickets.allocate(|t| queue.has_ticket(t))
    }

    /// Main node loop (spec §2's per-tick data flow).
    pub async fn run(mut self) {
        loop {
            self.maybe_broadcast_stp().await;

            while let Ok(line) = self.man.cmd_rx.try_recv() {
                self.handle_command(&line);
            }

            for i in 0..self.ports.len() {
                match self.ports[i].try_recv().await {
                    Ok(Some(pkt)) => self.handle_packet(pkt).await,
                    Ok(None) => {}
                    Err(e) => warn!(host = self.id, port = i, error = %e, "transport error on port"),
                }
            }

            if let Some(job) = self.queue.dequeue() {
                self.advance_job(job).await;
            }

            tokio::time::sleep(crate::constants::LOOP_SLEEP).await;
        }
    }

    async fn maybe_broadcast_stp(&mut self) {
        if Instant::now() < self.next_ctrl_tick {
            return;
        }
        self.next_ctrl_tick = Instant::now() + PERIODIC_CTRL_MSG_WAITTIME;
        if self.rounds_sent >= ALLOWED_CONVERGENCE_ROUNDS {
            return;
        }
        self.rounds_sent += 1;
        let payload = ControlPayload {
            root_id: self.id,
            root_dist: 0,
            sender_kind: SenderKind::Host,
            is_child: false,
        }
        .format();
        for port in self.ports.iter_mut() {
            if let Ok(pkt) = Packet::with_text(self.id, 255, PacketType::Control, &payload) {
                let _ = port.send(&pkt).await;
            }
        }
    }

    fn handle_command(&mut self, line: &str) {
        let cmd = match parse_command(line) {
            Ok(c) => c,
            Err(e) => {
                self.reply(format!("Error: {e}"));
                return;
            }
        };
        self.dispatch_command(cmd);
    }

    fn dispatch_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Status => {
                let dir = self
                    .local_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unset>".to_string());
                self.reply(format!("host {} directory: {dir}", self.id));
            }
            HostCommand::Help => {
                self.reply("commands: s, m <dir>, p <dst>, u <dst> <file>, d <dst> <file>, a <name>");
            }
            HostCommand::SetDir(dir) => {
                let path = PathBuf::from(&dir);
                if path.is_dir() {
                    self.local_dir = Some(path);
                    self.reply(format!("local directory set to {dir}"));
                } else {
                    self.reply(format!("'{dir}' is not an existing directory"));
                }
            }
            HostCommand::Ping(dest) => self.start_ping(dest),
            HostCommand::Upload(dest, file) => self.start_upload(dest, file),
            HostCommand::Download(dest, file) => self.start_download(dest, file),
            HostCommand::Register(name) => self.start_register(name),
        }
    }

    /// Resolve `dest` to a node id, or queue a DNS lookup and stash `resume`
    /// to be replayed once it completes.
    fn resolve_or_defer(&mut self, dest: Dest, resume: PendingCommand) -> Option<u8> {
        match dest {
            Dest::Id(id) => Some(id),
            Dest::Name(name) => {
                if let Some(&id) = self.name_cache.get(&name) {
                    return Some(id);
                }
                let ticket = self.new_ticket();
                if let Ok(pkt) = Packet::with_text(
                    self.id,
                    STATIC_DNS_ID,
                    PacketType::DnsQuery,
                    &format_with_ticket(ticket, &name),
                ) {
                    self.queue.enqueue(Job::new(
                        ticket,
                        DEFAULT_TTL,
                        JobKind::SendPacket(pkt),
                    ));
                    self.queue.enqueue(Job::new(
                        ticket,
                        DEFAULT_TTL,
                        JobKind::WaitForResponse(WaitKind::DnsQuery {
                            name,
                            resume: Box::new(resume),
                        }),
                    ));
                }
                None
            }
        }
    }

    fn start_ping(&mut self, dest: Dest) {
        let dest_clone = dest.clone();
        let Some(dst_id) = self.resolve_or_defer(dest, PendingCommand::Ping(dest_clone)) else {
            return;
        };
        let ticket = self.new_ticket();
        let text = format_with_ticket(ticket, "");
        match Packet::with_text(self.id, dst_id, PacketType::PingReq, &text) {
            Ok(pkt) => {
                self.queue.enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::SendPacket(pkt)));
                self.queue
                    .enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::WaitForResponse(WaitKind::Ping)));
            }
            Err(e) => self.reply(format!("Error: {e}")),
        }
    }

    fn start_upload(&mut self, dest: Dest, file: String) {
        let dest_clone = dest.clone();
        let file_clone = file.clone();
        let Some(dst_id) = self.resolve_or_defer(dest, PendingCommand::Upload(dest_clone, file_clone))
        else {
            return;
        };
        if !PathBuf::from(&file).is_file() {
            self.reply(format!("'{file}' does not exist locally"));
            return;
        }
        let ticket = self.new_ticket();
        let text = format_with_ticket(ticket, &file);
        match Packet::with_text(self.id, dst_id, PacketType::UploadReq, &text) {
            Ok(pkt) => {
                self.queue.enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::SendPacket(pkt)));
                self.queue.enqueue(Job::new(
                    ticket,
                    DEFAULT_TTL,
                    JobKind::WaitForResponse(WaitKind::UploadHandshake {
                        peer: dst_id,
                        filename: file,
                    }),
                ));
            }
            Err(e) => self.reply(format!("Error: {e}")),
        }
    }

    fn start_download(&mut self, dest: Dest, file: String) {
        let dest_clone = dest.clone();
        let file_clone = file.clone();
        let Some(dst_id) =
            self.resolve_or_defer(dest, PendingCommand::Download(dest_clone, file_clone))
        else {
            return;
        };
        if self.local_dir.is_none() {
            self.reply("No local directory set");
            return;
        }
        let ticket = self.new_ticket();
        let text = format_with_ticket(ticket, &file);
        match Packet::with_text(self.id, dst_id, PacketType::DownloadReq, &text) {
            Ok(pkt) => {
                self.queue.enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::SendPacket(pkt)));
                self.queue.enqueue(Job::new(
                    ticket,
                    DEFAULT_TTL,
                    JobKind::WaitForResponse(WaitKind::DownloadHandshake {
                        peer: dst_id,
                        filename: file,
                    }),
                ));
            }
            Err(e) => self.reply(format!("Error: {e}")),
        }
    }

    fn start_register(&mut self, name: String) {
        if name.len() > MAX_NAME_LEN {
            self.reply(format!("name too long (max {MAX_NAME_LEN} characters)"));
            return;
        }
        let ticket = self.new_ticket();
        let text = format_with_ticket(ticket, &name);
        match Packet::with_text(self.id, STATIC_DNS_ID, PacketType::DnsRegistration, &text) {
            Ok(pkt) => {
                self.queue.enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::SendPacket(pkt)));
                self.queue.enqueue(Job::new(
                    ticket,
                    DEFAULT_TTL,
                    JobKind::WaitForResponse(WaitKind::DnsRegister { name }),
                ));
            }
            Err(e) => self.reply(format!("Error: {e}")),
        }
    }

    async fn send_on_all_ports(&mut self, pkt: &Packet) {
        for port in self.ports.iter_mut() {
            if let Err(e) = port.send(pkt).await {
                debug!(host = self.id, error = %e, "send failed");
            }
        }
    }

    async fn handle_packet(&mut self, pkt: Packet) {
        if pkt.ty != PacketType::Control && pkt.dst != self.id {
            // Flooded until a switch learns the real destination; not ours.
            return;
        }
        match pkt.ty {
            PacketType::Control => {
                // Hosts do not run root election; the packet is only
                // meaningful to switches. Nothing to do.
            }
            PacketType::PingReq => {
                let reply = pkt.text().unwrap_or_default().to_string();
                if let Ok(response) = Packet::with_text(self.id, pkt.src, PacketType::PingResponse, &reply) {
                    self.send_on_all_ports(&response).await;
                }
            }
            PacketType::PingResponse => self.complete_ping(&pkt),
            PacketType::UploadReq => self.handle_upload_req(&pkt).await,
            PacketType::UploadResponse => self.handle_upload_response(&pkt).await,
            PacketType::DownloadReq => self.handle_download_req(&pkt).await,
            PacketType::DownloadResponse => self.handle_download_response(&pkt).await,
            PacketType::Upload => self.handle_upload_chunk(&pkt),
            PacketType::UploadEnd => self.handle_upload_end(&pkt),
            PacketType::DnsRegistrationResponse => self.complete_register(&pkt),
            PacketType::DnsQueryResponse => self.complete_query(&pkt),
            PacketType::DnsRegistration | PacketType::DnsQuery => {}
        }
    }

    fn complete_ping(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, _)) = split_ticket(text) else { return };
        if let Some(job) = self.queue.delete_by_ticket(ticket) {
            if matches!(&job.kind, JobKind::WaitForResponse(WaitKind::Ping)) {
                self.reply(format!("Ping to {} succeeded", pkt.src));
            }
        }
    }

    async fn handle_upload_req(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, filename)) = split_ticket(text) else { return };
        let reply_ok_or = |ok: bool, msg: &str| -> String {
            if ok {
                format_with_ticket(ticket, "Ready")
            } else {
                format_with_ticket(ticket, msg)
            }
        };
        let (accept, path) = match &self.local_dir {
            None => (false, PathBuf::new()),
            Some(dir) => {
                let path = dir.join(filename);
                if path.exists() {
                    (false, path)
                } else {
                    (true, path)
                }
            }
        };
        let msg = if self.local_dir.is_none() {
            "No local directory set".to_string()
        } else if !accept {
            format!("This file already exists in {}", self.local_dir.as_ref().unwrap().display())
        } else {
            String::new()
        };
        let payload = reply_ok_or(accept, &msg);
        if let Ok(response) = Packet::with_text(self.id, pkt.src, PacketType::UploadResponse, &payload) {
            self.send_on_all_ports(&response).await;
        }
        if accept {
            let mut transfer = FileTransfer::new(pkt.src, path, TransferOp::Upload);
            match std::fs::File::create(&transfer.path) {
                Ok(f) => transfer.handle = Some(f),
                Err(e) => {
                    warn!(host = self.id, error = %e, "failed to create upload destination file");
                    return;
                }
            }
            self.queue
                .enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::Receive(transfer)));
        }
    }

    async fn handle_upload_response(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, data)) = split_ticket(text) else { return };
        let Some(job) = self.queue.find_by_ticket(ticket) else { return };
        let WaitKind::UploadHandshake { peer, filename } = (match &job.kind {
            JobKind::WaitForResponse(w @ WaitKind::UploadHandshake { .. }) => w.clone(),
            _ => return,
        }) else {
            return;
        };
        if data == "Ready" {
            match std::fs::File::open(&filename) {
                Ok(f) => {
                    let mut transfer = FileTransfer::new(peer, PathBuf::from(&filename), TransferOp::Upload);
                    transfer.handle = Some(f);
                    job.kind = JobKind::Transmit(transfer);
                    job.state = JobState::Ready;
                }
                Err(e) => {
                    self.reply(format!("Upload failed: cannot open '{filename}': {e}"));
                    self.queue.delete_by_ticket(ticket);
                }
            }
        } else {
            let msg = data.to_string();
            self.reply(format!("Upload rejected: {msg}"));
            self.queue.delete_by_ticket(ticket);
        }
    }

    async fn handle_download_req(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, filename)) = split_ticket(text) else { return };
        let path = self.local_dir.as_ref().map(|d| d.join(filename));
        let ok = matches!(&path, Some(p) if p.is_file());
        let msg = if self.local_dir.is_none() {
            "No local directory set".to_string()
        } else if !ok {
            "File not found".to_string()
        } else {
            "Ready".to_string()
        };
        if let Ok(response) =
            Packet::with_text(self.id, pkt.src, PacketType::DownloadResponse, &format_with_ticket(ticket, &msg))
        {
            self.send_on_all_ports(&response).await;
        }
        if ok {
            let mut transfer = FileTransfer::new(pkt.src, path.unwrap(), TransferOp::Download);
            match std::fs::File::open(&transfer.path) {
                Ok(f) => transfer.handle = Some(f),
                Err(e) => {
                    warn!(host = self.id, error = %e, "failed to open file for download");
                    return;
                }
            }
            self.queue
                .enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::Transmit(transfer)));
        }
    }

    async fn handle_download_response(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, data)) = split_ticket(text) else { return };
        let Some(job) = self.queue.find_by_ticket(ticket) else { return };
        let WaitKind::DownloadHandshake { peer, filename } = (match &job.kind {
            JobKind::WaitForResponse(w @ WaitKind::DownloadHandshake { .. }) => w.clone(),
            _ => return,
        }) else {
            return;
        };
        if data == "Ready" {
            let dest_path = self.local_dir.as_ref().unwrap().join(&filename);
            match std::fs::File::create(&dest_path) {
                Ok(f) => {
                    let mut transfer = FileTransfer::new(peer, dest_path, TransferOp::Download);
                    transfer.handle = Some(f);
                    job.kind = JobKind::Receive(transfer);
                    job.state = JobState::Ready;
                }
                Err(e) => {
                    self.reply(format!("Download failed: cannot create '{filename}': {e}"));
                    self.queue.delete_by_ticket(ticket);
                }
            }
        } else {
            let msg = data.to_string();
            self.reply(format!("Download rejected: {msg}"));
            self.queue.delete_by_ticket(ticket);
        }
    }

    fn handle_upload_chunk(&mut self, pkt: &Packet) {
        let Ok((ticket, chunk)) = split_ticket_bytes(&pkt.payload) else { return };
        let mut write_err: Option<String> = None;
        if let Some(job) = self.queue.find_by_ticket(ticket) {
            if let JobKind::Receive(transfer) = &mut job.kind {
                if let Some(f) = transfer.handle.as_mut() {
                    match f.write_all(chunk) {
                        Ok(()) => transfer.offset += chunk.len() as u64,
                        Err(e) => write_err = Some(e.to_string()),
                    }
                }
            }
        }
        if let Some(e) = write_err {
            warn!(host = self.id, error = %e, "write failed during transfer");
            self.reply(format!("Upload failed: local write error: {e}"));
            self.queue.delete_by_ticket(ticket);
        }
    }

    fn handle_upload_end(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, _)) = split_ticket(text) else { return };
        if let Some(job) = self.queue.find_by_ticket(ticket) {
            if let JobKind::Receive(transfer) = &mut job.kind {
                transfer.handle = None; // drop closes the file
                job.state = JobState::Complete;
                let label = match transfer.op {
                    TransferOp::Upload => "Upload",
                    TransferOp::Download => "Download",
                };
                self.reply(format!("{label} complete: {}", transfer.path.display()));
            }
        }
    }

    fn complete_register(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, data)) = split_ticket(text) else { return };
        if let Some(job) = self.queue.delete_by_ticket(ticket) {
            if let JobKind::WaitForResponse(WaitKind::DnsRegister { name }) = job.kind {
                if data == "OK" {
                    self.reply(format!("Registered '{name}'"));
                } else {
                    self.reply(format!("Registration of '{name}' failed: {data}"));
                }
            }
        }
    }

    fn complete_query(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, data)) = split_ticket(text) else { return };
        let Some(job) = self.queue.delete_by_ticket(ticket) else { return };
        let JobKind::WaitForResponse(WaitKind::DnsQuery { name, resume }) = job.kind else {
            return;
        };
        let id: Option<u8> = data.parse::<i32>().ok().and_then(|v| {
            if v >= 0 && v <= u8::MAX as i32 {
                Some(v as u8)
            } else {
                None
            }
        });
        match id {
            Some(id) => {
                self.name_cache.insert(name.clone(), id);
                info!(host = self.id, %name, %id, "resolved name");
                self.replay(*resume);
            }
            None => self.reply(format!("Name '{name}' not found")),
        }
    }

    fn replay(&mut self, cmd: PendingCommand) {
        match cmd {
            PendingCommand::Ping(dest) => self.start_ping(dest),
            PendingCommand::Upload(dest, file) => self.start_upload(dest, file),
            PendingCommand::Download(dest, file) => self.start_download(dest, file),
        }
    }

    /// Dequeue-and-advance step for every job kind (spec §2 step 4).
    async fn advance_job(&mut self, mut job: Job) {
        if job.state == JobState::Complete || job.state == JobState::Error {
            return; // terminal jobs are dropped, not re-enqueued
        }

        if let JobKind::WaitForResponse(ref wait) = job.kind {
            if job.ttl == 0 {
                let msg = wait.timeout_message();
                self.reply(msg);
                return;
            }
            job.ttl -= 1;
            self.queue.enqueue(job);
            return;
        }

        match job.kind {
            JobKind::SendPacket(ref pkt) => {
                self.send_on_all_ports(pkt).await;
                // one-shot: do not re-enqueue.
            }
            JobKind::Transmit(ref mut transfer) => {
                let done = self.advance_transmit(job.ticket, transfer).await;
                if !done {
                    self.queue.enqueue(job);
                }
            }
            JobKind::Receive(_) => {
                // Progress happens as Upload/UploadEnd packets arrive; a
                // Receive job just needs to stay queued until then.
                self.queue.enqueue(job);
            }
            _ => {
                // Switch-only kinds never appear on a host.
            }
        }
    }

    /// Sends one more chunk (or the closing `UPLOAD_END`) of an active
    /// transmit job. Returns `true` once the job is finished and should be
    /// dropped rather than re-enqueued.
    async fn advance_transmit(&mut self, ticket: Ticket, transfer: &mut FileTransfer) -> bool {
        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let Some(handle) = transfer.handle.as_mut() else {
            return true; // already closed by a previous tick; don't loop forever
        };
        let _ = handle.seek(SeekFrom::Start(transfer.offset));
        let n = match handle.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                warn!(host = self.id, error = %e, "read failed during transfer");
                transfer.handle = None;
                return true;
            }
        };
        if n == 0 {
            let text = format_with_ticket(ticket, "");
            if let Ok(pkt) = Packet::with_text(self.id, transfer.peer, PacketType::UploadEnd, &text) {
                self.send_on_all_ports(&pkt).await;
            }
            transfer.handle = None;
            let label = match transfer.op {
                TransferOp::Upload => "Upload",
                TransferOp::Download => "Download",
            };
            self.reply(format!("{label} complete: {}", transfer.path.display()));
            return true;
        }
        transfer.offset += n as u64;
        let payload = format_with_ticket_bytes(ticket, &buf[..n]);
        if let Ok(pkt) = Packet::new(self.id, transfer.peer, PacketType::Upload, payload) {
            self.send_on_all_ports(&pkt).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TransferOp;
    use std::io::Write as _;

    fn man_pair() -> (ManLink, mpsc::Sender<String>, mpsc::Receiver<String>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (reply_tx, reply_rx) = mpsc::channel(4);
        (ManLink { cmd_rx, reply_tx }, cmd_tx, reply_rx)
    }

    /// Regression test: a `Transmit` job must be dropped once the file is
    /// exhausted and `UPLOAD_END` has been sent, not re-enqueued forever
    /// with a closed file handle.
    #[tokio::test]
    async fn finished_transmit_job_is_dropped_not_looped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hi").unwrap();

        let (sink, _peer_end) = crate::port::PipePort::pair(1, 3);
        let (man, _cmd_tx, _reply_rx) = man_pair();
        let mut ctx = HostContext::new(1, vec![Box::new(sink)], man);

        let ticket = Ticket::new(42);
        let mut transfer = FileTransfer::new(3, file.path().to_path_buf(), TransferOp::Upload);
        transfer.handle = Some(std::fs::File::open(file.path()).unwrap());
        ctx.queue
            .enqueue(Job::new(ticket, DEFAULT_TTL, JobKind::Transmit(transfer)));

        // First dequeue sends the file's only chunk; the job re-enqueues to
        // send the closing UPLOAD_END on its next turn.
        let job = ctx.queue.dequeue().unwrap();
        ctx.advance_job(job).await;
        assert_eq!(ctx.queue.length(), 1);

        // Second dequeue hits EOF, sends UPLOAD_END, and must not come back.
        let job = ctx.queue.dequeue().unwrap();
        ctx.advance_job(job).await;
        assert_eq!(
            ctx.queue.length(),
            0,
            "a completed transmit job must not loop in the queue forever"
        );
    }
}
