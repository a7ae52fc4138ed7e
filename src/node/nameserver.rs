//! # Name Server
//!
//! The node pinned at [`crate::constants::STATIC_DNS_ID`] holds the
//! authoritative id→name table (spec §4.5). Each id owns exactly one
//! canonical name at a time: registering overwrites whatever name that id
//! held before, and registering a name already held by another id simply
//! reassigns it, since the table is keyed by id, not by name. Like a host,
//! the name server is an STP leaf: it never runs root election, it just
//! tells attached switches its link is always reachable.

use crate::constants::{PERIODIC_CTRL_MSG_WAITTIME, STATIC_DNS_ID};
use crate::packet::{Packet, PacketType};
use crate::port::Port;
use crate::stp::{ControlPayload, SenderKind};
use crate::ticket::{format_with_ticket, split_ticket};
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;

pub struct NameServerContext {
    ports: Vec<Box<dyn Port>>,
    /// node id -> its current canonical name.
    names: HashMap<u8, String>,
    next_ctrl_tick: Instant,
}

impl NameServerContext {
    pub fn new(ports: Vec<Box<dyn Port>>) -> Self {
        Self {
            ports,
            names: HashMap::new(),
            next_ctrl_tick: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        loop {
            self.maybe_broadcast_stp().await;

            for i in 0..self.ports.len() {
                match self.ports[i].try_recv().await {
                    Ok(Some(pkt)) => self.handle_packet(pkt).await,
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, port = i, "transport error on name server port"),
                }
            }

            tokio::time::sleep(crate::constants::LOOP_SLEEP).await;
        }
    }

    async fn maybe_broadcast_stp(&mut self) {
        if Instant::now() < self.next_ctrl_tick {
            return;
        }
        self.next_ctrl_tick = Instant::now() + PERIODIC_CTRL_MSG_WAITTIME;
        let payload = ControlPayload {
            root_id: STATIC_DNS_ID,
            root_dist: 0,
            sender_kind: SenderKind::NameServer,
            is_child: false,
        }
        .format();
        for port in self.ports.iter_mut() {
            if let Ok(pkt) = Packet::with_text(STATIC_DNS_ID, 255, PacketType::Control, &payload) {
                let _ = port.send(&pkt).await;
            }
        }
    }

    async fn send_on_all_ports(&mut self, pkt: &Packet) {
        for port in self.ports.iter_mut() {
            let _ = port.send(pkt).await;
        }
    }

    async fn handle_packet(&mut self, pkt: Packet) {
        match pkt.ty {
            PacketType::DnsRegistration => self.handle_registration(&pkt).await,
            PacketType::DnsQuery => self.handle_query(&pkt).await,
            _ => {}
        }
    }

    async fn handle_registration(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, name)) = split_ticket(text) else { return };
        self.names.insert(pkt.src, name.to_string());
        if let Ok(response) = Packet::with_text(
            STATIC_DNS_ID,
            pkt.src,
            PacketType::DnsRegistrationResponse,
            &format_with_ticket(ticket, "OK"),
        ) {
            self.send_on_all_ports(&response).await;
        }
    }

    async fn handle_query(&mut self, pkt: &Packet) {
        let Ok(text) = pkt.text() else { return };
        let Ok((ticket, name)) = split_ticket(text) else { return };
        let reply = match self.names.iter().find(|(_, n)| n.as_str() == name) {
            Some((&id, _)) => id.to_string(),
            None => "-1".to_string(),
        };
        if let Ok(response) = Packet::with_text(
            STATIC_DNS_ID,
            pkt.src,
            PacketType::DnsQueryResponse,
            &format_with_ticket(ticket, &reply),
        ) {
            self.send_on_all_ports(&response).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PipePort;

    #[tokio::test]
    async fn registers_and_resolves_a_name() {
        let (mut host, ns_end) = PipePort::pair(0, STATIC_DNS_ID);
        let mut ns = NameServerContext::new(vec![Box::new(ns_end)]);

        let reg = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsRegistration, "0001:alice").unwrap();
        host.send(&reg).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let ack = host.try_recv().await.unwrap().unwrap();
        assert_eq!(ack.text().unwrap(), "0001:OK");

        let query = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsQuery, "0002:alice").unwrap();
        host.send(&query).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let reply = host.try_recv().await.unwrap().unwrap();
        assert_eq!(reply.text().unwrap(), "0002:0");
    }

    #[tokio::test]
    async fn reregistration_overwrites_the_same_id() {
        let (mut host, ns_end) = PipePort::pair(0, STATIC_DNS_ID);
        let mut ns = NameServerContext::new(vec![Box::new(ns_end)]);

        let reg_a = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsRegistration, "0001:alice").unwrap();
        host.send(&reg_a).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let _ = host.try_recv().await.unwrap();

        let reg_b = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsRegistration, "0002:bob").unwrap();
        host.send(&reg_b).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let ack = host.try_recv().await.unwrap().unwrap();
        assert_eq!(ack.text().unwrap(), "0002:OK");

        let query_old = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsQuery, "0003:alice").unwrap();
        host.send(&query_old).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let reply = host.try_recv().await.unwrap().unwrap();
        assert_eq!(reply.text().unwrap(), "0003:-1");

        let query_new = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsQuery, "0004:bob").unwrap();
        host.send(&query_new).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let reply = host.try_recv().await.unwrap().unwrap();
        assert_eq!(reply.text().unwrap(), "0004:0");
    }

    #[tokio::test]
    async fn second_host_registering_an_existing_name_reassigns_it() {
        let (mut host_a, ns_end_a) = PipePort::pair(0, STATIC_DNS_ID);
        let (mut host_b, ns_end_b) = PipePort::pair(1, STATIC_DNS_ID);
        let mut ns = NameServerContext::new(vec![Box::new(ns_end_a), Box::new(ns_end_b)]);

        let reg_a = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsRegistration, "0001:bob").unwrap();
        host_a.send(&reg_a).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let _ = host_a.try_recv().await.unwrap();

        let reg_b = Packet::with_text(1, STATIC_DNS_ID, PacketType::DnsRegistration, "0002:bob").unwrap();
        host_b.send(&reg_b).await.unwrap();
        let got = ns.ports[1].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let reply = host_b.try_recv().await.unwrap().unwrap();
        assert_eq!(reply.text().unwrap(), "0002:OK");

        let query = Packet::with_text(0, STATIC_DNS_ID, PacketType::DnsQuery, "0003:bob").unwrap();
        host_a.send(&query).await.unwrap();
        let got = ns.ports[0].try_recv().await.unwrap().unwrap();
        ns.handle_packet(got).await;
        let reply = host_a.try_recv().await.unwrap().unwrap();
        assert_eq!(reply.text().unwrap(), "0003:1");
    }
}
