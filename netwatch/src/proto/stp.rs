//! IEEE 802.1 Bridge Spanning Tree Protocol.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{llc, Layer};
use crate::pdu::Pdu;
use crate::proto::eth::LlcHeader;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

const MIN_CONF_BPDU: usize = 35;

pub struct StpBpdu {
    pub protocol_id: u16,
    pub version: u8,
    pub bpdu_type: u8,
    /// Present only when the BPDU is at least [`MIN_CONF_BPDU`] bytes.
    pub config: Option<StpConfig>,
}

pub struct StpConfig {
    pub topology_change_ack: bool,
    pub agreement: bool,
    pub forwarding: bool,
    pub learning: bool,
    pub port_role: u8,
    pub proposal: bool,
    pub topology_change: bool,
    pub root_id: [u8; 8],
    pub root_path_cost: u32,
    pub bridge_id: [u8; 8],
    pub port_id: u16,
    pub message_age: u16,
    pub max_age: u16,
    pub hello_time: u16,
    pub forward_delay: u16,
}

pub struct StpHandler {
    counters: Counters,
}

impl StpHandler {
    pub fn new() -> Self {
        StpHandler { counters: Counters::default() }
    }
}

impl Handler for StpHandler {
    fn short_name(&self) -> &'static str {
        "stp"
    }
    fn long_name(&self) -> &'static str {
        "Spanning Tree Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let dsap = reader.u8()?;
        let ssap = reader.u8()?;
        let control = reader.u8()?;
        if dsap != llc::STP as u8 || ssap != llc::STP as u8 {
            return Err(DecodeError::Decode("LLC dsap/ssap mismatch for STP"));
        }
        let llc_header = LlcHeader { dsap, ssap, control };

        // The BPDU proper must contain at least 4 bytes (protocol id,
        // version, type).
        if reader.remaining() < 4 {
            return Err(DecodeError::Truncated("BPDU shorter than 4 bytes"));
        }
        let protocol_id = reader.u16_be()?;

        // The source this is grounded on writes `if (!protocol_id == 0x0)`,
        // which due to operator precedence evaluates as
        // `if ((!protocol_id) == 0x0)` -- backwards from the comment right
        // above it ("protocol id 0x00 identifies the (Rapid) Spanning Tree
        // Protocol"). The correct check is simply "protocol_id must be 0".
        if protocol_id != 0x0 {
            return Err(DecodeError::Decode("STP protocol id must be 0"));
        }

        let version = reader.u8()?;
        let bpdu_type = reader.u8()?;

        let config = if reader.remaining() >= MIN_CONF_BPDU - 4 {
            let flags = reader.u8()?;
            let mut root_id = [0u8; 8];
            root_id.copy_from_slice(reader.bytes(8)?);
            let root_path_cost = reader.u32_be()?;
            let mut bridge_id = [0u8; 8];
            bridge_id.copy_from_slice(reader.bytes(8)?);
            let port_id = reader.u16_be()?;
            let message_age = reader.u16_be()?;
            let max_age = reader.u16_be()?;
            let hello_time = reader.u16_be()?;
            let forward_delay = reader.u16_be()?;
            Some(StpConfig {
                topology_change_ack: flags & 0x80 != 0,
                agreement: flags & 0x40 != 0,
                forwarding: flags & 0x20 != 0,
                learning: flags & 0x10 != 0,
                port_role: (flags & 0x0c) >> 2,
                proposal: flags & 0x02 != 0,
                topology_change: flags & 0x01 != 0,
                root_id,
                root_path_cost,
                bridge_id,
                port_id,
                message_age,
                max_age,
                hello_time,
                forward_delay,
            })
        } else {
            None
        };

        self.counters.record(reader.remaining());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Llc802,
            key: llc::STP,
            id: registry.id_of(Layer::Llc802, llc::STP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 3 + 4,
            data: ProtocolData::Stp { llc: llc_header, bpdu: StpBpdu { protocol_id, version, bpdu_type, config } },
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::register_all;
    use crate::registry::Registry;

    fn llc_stp_frame(protocol_id: u16, trailing: &[u8]) -> Vec<u8> {
        let mut eth = vec![0u8; 12];
        let payload_len = 3 + trailing.len() + 2;
        eth.extend_from_slice(&(payload_len as u16).to_be_bytes());
        eth.push(0x42); // dsap
        eth.push(0x42); // ssap
        eth.push(0x03); // control
        eth.extend_from_slice(&protocol_id.to_be_bytes());
        eth.extend_from_slice(trailing);
        eth
    }

    #[test]
    fn protocol_id_zero_is_accepted() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let frame = llc_stp_frame(0x0000, &[0x00, 0x00]); // version, type
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        let stp = pkt.root.next.expect("stp pdu present");
        match &stp.data {
            ProtocolData::Stp { bpdu, .. } => assert_eq!(bpdu.protocol_id, 0),
            _ => panic!("expected stp pdu"),
        }
    }

    #[test]
    fn nonzero_protocol_id_is_rejected() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let frame = llc_stp_frame(0x0001, &[0x00, 0x00]);
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        assert!(matches!(pkt.status, PacketStatus::DecodeErr(_)));
        assert!(pkt.root.next.is_none());
    }
}
