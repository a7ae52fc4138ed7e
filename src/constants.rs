//! Constants shared across the packet codec, job lifecycle, and switch plane.
//!
//! Values are pinned to the original simulator's `constants.h` so that wire
//! framing and timing defaults match a known-good implementation rather than
//! being invented here.

use std::time::Duration;

/// Largest allowable packet payload, in bytes.
pub const PAYLOAD_MAX: usize = 100;

/// Bytes in a packet header (`src`, `dst`, `type`, `length`).
pub const HEADER_LEN: usize = 4;

/// Number of decimal digits in a ticket.
pub const TICKET_LEN: usize = 4;

/// Payload space left for transfer chunks once a ticket and the `:` and
/// `:`-terminator are subtracted: `PAYLOAD_MAX - 2 - TICKET_LEN`.
pub const MAX_RESPONSE_LEN: usize = PAYLOAD_MAX - 2 - TICKET_LEN;

/// Longest domain name a host may register or query.
pub const MAX_NAME_LEN: usize = MAX_RESPONSE_LEN - 4;

/// Default time-to-live, in ticks, for a `WaitForResponse` job.
pub const DEFAULT_TTL: u32 = 20;

/// Reserved node id for the name server.
pub const STATIC_DNS_ID: u8 = 100;

/// Broadcast destination address.
pub const BROADCAST_DST: u8 = 255;

/// Simulated tick quantum: how long a node sleeps between loop iterations.
pub const LOOP_SLEEP: Duration = Duration::from_millis(10);

/// How often a node emits spanning-tree control packets.
pub const PERIODIC_CTRL_MSG_WAITTIME: Duration = Duration::from_millis(500);

/// Number of STP broadcast rounds after which a node stops emitting control
/// packets. The topology is assumed static past this point.
pub const ALLOWED_CONVERGENCE_ROUNDS: u32 = 10;

/// Reserved ticket used on the wire for STP control packets (`"9999:..."`).
pub const CONTROL_TICKET: &str = "9999";
