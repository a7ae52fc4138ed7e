//! # Packet Format and Wire Codec
//!
//! This module defines the fixed-layout frame exchanged between nodes and
//! the codec that turns it into bytes. Every link in the simulation,
//! whether backed by an in-process pipe or a real TCP socket, carries the
//! same four-byte header followed by up to [`PAYLOAD_MAX`](crate::constants::PAYLOAD_MAX)
//! bytes of payload.
//!
//! ## Wire layout
//!
//! ```text
//! +-----+-----+------+--------+---------------------+
//! | src | dst | type | length | payload (length B)  |
//! +-----+-----+------+--------+---------------------+
//!   u8    u8    u8      u8
//! ```

use crate::constants::{BROADCAST_DST, HEADER_LEN, PAYLOAD_MAX};
use crate::error::NetsimError;

/// The closed set of packet kinds the simulator exchanges.
///
/// Unknown values decoded off the wire are a protocol error, not a silent
/// drop, per spec §9's "dynamic dispatch via packet type" redesign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    PingReq = 0,
    PingResponse = 1,
    UploadReq = 2,
    UploadResponse = 3,
    Upload = 4,
    UploadEnd = 5,
    DownloadReq = 6,
    DownloadResponse = 7,
    DnsRegistration = 8,
    DnsRegistrationResponse = 9,
    DnsQuery = 10,
    DnsQueryResponse = 11,
    Control = 12,
}

impl PacketType {
    fn from_u8(v: u8) -> Option<Self> {
        use PacketType::*;
        Some(match v {
            0 => PingReq,
            1 => PingResponse,
            2 => UploadReq,
            3 => UploadResponse,
            4 => Upload,
            5 => UploadEnd,
            6 => DownloadReq,
            7 => DownloadResponse,
            8 => DnsRegistration,
            9 => DnsRegistrationResponse,
            10 => DnsQuery,
            11 => DnsQueryResponse,
            12 => Control,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = match self {
            PacketType::PingReq => "PING_REQ",
            PacketType::PingResponse => "PING_RESPONSE",
            PacketType::UploadReq => "UPLOAD_REQ",
            PacketType::UploadResponse => "UPLOAD_RESPONSE",
            PacketType::Upload => "UPLOAD",
            PacketType::UploadEnd => "UPLOAD_END",
            PacketType::DownloadReq => "DOWNLOAD_REQ",
            PacketType::DownloadResponse => "DOWNLOAD_RESPONSE",
            PacketType::DnsRegistration => "DNS_REGISTRATION",
            PacketType::DnsRegistrationResponse => "DNS_REGISTRATION_RESPONSE",
            PacketType::DnsQuery => "DNS_QUERY",
            PacketType::DnsQueryResponse => "DNS_QUERY_RESPONSE",
            PacketType::Control => "CONTROL",
        };
        write!(f, "{lit}")
    }
}

/// A fixed-layout frame exchanged between nodes.
///
/// `payload` always holds exactly `length` meaningful bytes; callers must
/// not rely on trailing bytes beyond `length`.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src: u8,
    pub dst: u8,
    pub ty: PacketType,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a new packet, enforcing the payload size invariant from spec §3.
    pub fn new(src: u8, dst: u8, ty: PacketType, payload: Vec<u8>) -> Result<Self, NetsimError> {
        if payload.len() > PAYLOAD_MAX {
            return Err(NetsimError::Malformed(format!(
                "payload of {} bytes exceeds PAYLOAD_MAX ({})",
                payload.len(),
                PAYLOAD_MAX
            )));
        }
        Ok(Self {
            src,
            dst,
            ty,
            payload,
        })
    }

    /// Build a packet whose payload is an application string, already
    /// formatted as `"TTTT:<data>"`.
    pub fn with_text(src: u8, dst: u8, ty: PacketType, text: &str) -> Result<Self, NetsimError> {
        Self::new(src, dst, ty, text.as_bytes().to_vec())
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst == BROADCAST_DST
    }

    /// Decode the payload as UTF-8 text. Malformed (non-UTF-8) payloads are
    /// a protocol error, not a panic.
    pub fn text(&self) -> Result<&str, NetsimError> {
        std::str::from_utf8(&self.payload)
            .map_err(|_| NetsimError::Malformed("payload is not valid UTF-8".into()))
    }

    /// Encode header + payload into the exact bytes that cross a link.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.src);
        out.push(self.dst);
        out.push(self.ty as u8);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a whole frame (header + payload) from bytes.
    ///
    /// Returns `Malformed` if the header's length field disagrees with the
    /// number of bytes actually supplied, or if the type tag is unknown.
    pub fn decode(bytes: &[u8]) -> Result<Self, NetsimError> {
        if bytes.len() < HEADER_LEN {
            return Err(NetsimError::Malformed("frame shorter than header".into()));
        }
        let src = bytes[0];
        let dst = bytes[1];
        let ty_raw = bytes[2];
        let length = bytes[3] as usize;
        let ty = PacketType::from_u8(ty_raw)
            .ok_or_else(|| NetsimError::Malformed(format!("unknown packet type tag {ty_raw}")))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != length {
            return Err(NetsimError::Malformed(format!(
                "header length {length} does not match actual payload of {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            src,
            dst,
            ty,
            payload: payload.to_vec(),
        })
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}(src={}, dst={}, len={})",
            self.ty,
            self.src,
            self.dst,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_payload() {
        let pkt = Packet::with_text(1, 3, PacketType::PingReq, "0001:").unwrap();
        let bytes = pkt.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 5);
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.src, 1);
        assert_eq!(decoded.dst, 3);
        assert_eq!(decoded.ty, PacketType::PingReq);
        assert_eq!(decoded.text().unwrap(), "0001:");
    }

    #[test]
    fn rejects_oversized_payload() {
        let oversized = vec![0u8; PAYLOAD_MAX + 1];
        assert!(Packet::new(0, 1, PacketType::Upload, oversized).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = Packet::with_text(0, 1, PacketType::PingReq, "0001:")
            .unwrap()
            .encode();
        bytes[3] = 99; // claim 99 bytes of payload but only supply 5
        assert!(Packet::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let mut bytes = Packet::with_text(0, 1, PacketType::PingReq, "0001:")
            .unwrap()
            .encode();
        bytes[2] = 250;
        assert!(Packet::decode(&bytes).is_err());
    }

    #[test]
    fn broadcast_destination_is_255() {
        let pkt = Packet::with_text(1, BROADCAST_DST, PacketType::Control, "9999:0:0:H:N").unwrap();
        assert!(pkt.is_broadcast());
    }
}
