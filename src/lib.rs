//! # netsim
//!
//! An in-process simulator for a small packet-switched network: hosts,
//! learning switches running a spanning-tree protocol, a name server, and
//! an application protocol for ping, file upload/download, and name
//! resolution. See `SPEC_FULL.md` at the repository root for the full
//! design.

pub mod config;
pub mod constants;
pub mod error;
pub mod job;
pub mod manager;
pub mod node;
pub mod packet;
pub mod port;
pub mod stp;
pub mod ticket;
