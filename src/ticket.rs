//! Ticket type and allocator.
//!
//! A ticket pairs an outbound request with its eventual response. On the
//! wire it is always a zero-padded 4-digit decimal string; in memory it is
//! a small newtype so the rest of the crate cannot confuse it with an
//! arbitrary `u16`.

use crate::constants::TICKET_LEN;
use crate::error::NetsimError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u16);

impl Ticket {
    pub const MODULUS: u16 = 10_000;

    pub fn new(value: u16) -> Self {
        Self(value % Self::MODULUS)
    }

    /// Parse a ticket from its zero-padded ASCII representation.
    pub fn parse(s: &str) -> Result<Self, NetsimError> {
        if s.len() != TICKET_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetsimError::Malformed(format!(
                "'{s}' is not a {TICKET_LEN}-digit ticket"
            )));
        }
        s.parse::<u16>()
            .map(Ticket::new)
            .map_err(|_| NetsimError::Malformed(format!("'{s}' is not a valid ticket")))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = TICKET_LEN)
    }
}

/// Splits an application payload of the form `"TTTT:<data>"` into its
/// ticket and the remaining data slice.
pub fn split_ticket(payload: &str) -> Result<(Ticket, &str), NetsimError> {
    let (head, rest) = payload
        .split_once(':')
        .ok_or_else(|| NetsimError::Malformed(format!("payload '{payload}' missing ':'")))?;
    Ok((Ticket::parse(head)?, rest))
}

/// Formats a ticket and data into the `"TTTT:<data>"` wire form.
pub fn format_with_ticket(ticket: Ticket, data: &str) -> String {
    format!("{ticket}:{data}")
}

/// Byte-safe variant of [`split_ticket`], for payloads whose `data` portion
/// carries raw file bytes rather than text (upload/download chunks must not
/// be interpreted as UTF-8; spec §4.3's chunks are opaque bytes).
pub fn split_ticket_bytes(payload: &[u8]) -> Result<(Ticket, &[u8]), NetsimError> {
    let colon = payload
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| NetsimError::Malformed("payload missing ':'".into()))?;
    let head = std::str::from_utf8(&payload[..colon])
        .map_err(|_| NetsimError::Malformed("ticket prefix is not ASCII".into()))?;
    let ticket = Ticket::parse(head)?;
    Ok((ticket, &payload[colon + 1..]))
}

/// Byte-safe variant of [`format_with_ticket`], for chunk payloads.
pub fn format_with_ticket_bytes(ticket: Ticket, data: &[u8]) -> Vec<u8> {
    let mut out = ticket.to_string().into_bytes();
    out.push(b':');
    out.extend_from_slice(data);
    out
}

/// Monotone, collision-avoiding ticket generator.
///
/// A fresh ticket is handed out by incrementing a counter modulo 10 000;
/// any value still live in the caller's job queue is skipped, per spec
/// §4.2. The allocator itself does not look at the queue: callers pass a
/// predicate so this module stays independent of [`crate::job`].
pub struct TicketAllocator {
    next: u16,
}

impl Default for TicketAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next ticket for which `is_live` is `false`, advancing the
    /// internal counter past it.
    pub fn allocate(&mut self, is_live: impl Fn(Ticket) -> bool) -> Ticket {
        loop {
            let candidate = Ticket::new(self.next);
            self.next = (self.next + 1) % Ticket::MODULUS;
            if !is_live(candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded() {
        assert_eq!(Ticket::new(7).to_string(), "0007");
        assert_eq!(Ticket::new(1234).to_string(), "1234");
    }

    #[test]
    fn wraps_modulo_10000() {
        assert_eq!(Ticket::new(10_005).to_string(), "0005");
    }

    #[test]
    fn splits_and_formats_payload() {
        let (ticket, rest) = split_ticket("0042:hello").unwrap();
        assert_eq!(ticket, Ticket::new(42));
        assert_eq!(rest, "hello");
        assert_eq!(format_with_ticket(ticket, "hello"), "0042:hello");
    }

    #[test]
    fn splits_and_formats_binary_payload() {
        let raw: &[u8] = &[0x00, 0xff, 0x80, b'\n', 0x10];
        let framed = format_with_ticket_bytes(Ticket::new(9), raw);
        let (ticket, data) = split_ticket_bytes(&framed).unwrap();
        assert_eq!(ticket, Ticket::new(9));
        assert_eq!(data, raw);
    }

    #[test]
    fn allocator_skips_live_tickets() {
        let mut alloc = TicketAllocator::new();
        let live = [Ticket::new(0), Ticket::new(1)];
        let t = alloc.allocate(|t| live.contains(&t));
        assert_eq!(t, Ticket::new(2));
    }

    #[test]
    fn rejects_malformed_tickets() {
        assert!(Ticket::parse("12").is_err());
        assert!(Ticket::parse("12ab").is_err());
    }
}
