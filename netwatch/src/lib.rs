//! Live-capture network traffic monitor: decode frames into protocol PDU
//! chains, track TCP flows and hosts, and filter packets with a
//! BPF-classic virtual machine.
//!
//! See `capture` for feeding frames in, `session::Session` for the
//! composition root that ties decoding to the flow/host analyzers, and
//! `filter` for the packet-filter assembler and interpreter.

pub mod arena;
pub mod capture;
pub mod decode;
pub mod dns_cache;
pub mod error;
pub mod filter;
pub mod flow;
pub mod host;
pub mod layer;
pub mod pdu;
pub mod proto;
pub mod pubsub;
pub mod reader;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use session::Session;
