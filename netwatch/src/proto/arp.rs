//! Address Resolution Protocol, IPv4-over-Ethernet subset.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{ethertype, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
    Other(u16),
}

pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: [u8; 6],
    pub sender_ip: [u8; 4],
    pub target_mac: [u8; 6],
    pub target_ip: [u8; 4],
}

pub struct ArpHandler {
    counters: Counters,
}

impl ArpHandler {
    pub fn new() -> Self {
        ArpHandler { counters: Counters::default() }
    }
}

impl Handler for ArpHandler {
    fn short_name(&self) -> &'static str {
        "arp"
    }
    fn long_name(&self) -> &'static str {
        "Address Resolution Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let htype = reader.u16_be()?;
        let ptype = reader.u16_be()?;
        let hlen = reader.u8()?;
        let plen = reader.u8()?;
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(DecodeError::Decode("unsupported ARP hardware/protocol address sizes"));
        }
        let op = match reader.u16_be()? {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        };
        let mut sender_mac = [0u8; 6];
        sender_mac.copy_from_slice(reader.bytes(6)?);
        let mut sender_ip = [0u8; 4];
        sender_ip.copy_from_slice(reader.bytes(4)?);
        let mut target_mac = [0u8; 6];
        target_mac.copy_from_slice(reader.bytes(6)?);
        let mut target_ip = [0u8; 4];
        target_ip.copy_from_slice(reader.bytes(4)?);

        self.counters.record(28);
        let pdu = arena.alloc(Pdu {
            layer: Layer::EtherType,
            key: ethertype::ARP,
            id: registry.id_of(Layer::EtherType, ethertype::ARP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 28,
            data: ProtocolData::Arp(ArpPacket { op, sender_mac, sender_ip, target_mac, target_ip }),
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

    fn arp_who_has() -> Vec<u8> {
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&(ethertype::ARP as u16).to_be_bytes());
        f.extend_from_slice(&1u16.to_be_bytes()); // htype
        f.extend_from_slice(&0x0800u16.to_be_bytes()); // ptype
        f.push(6);
        f.push(4);
        f.extend_from_slice(&1u16.to_be_bytes()); // request
        f.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        f.extend_from_slice(&[10, 0, 0, 1]);
        f.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        f.extend_from_slice(&[10, 0, 0, 2]);
        f
    }

    #[test]
    fn s1_arp_who_has() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let frame = arp_who_has();
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        assert!(pkt.is_ok());
        let arp_pdu = pkt.root.next.expect("arp pdu present");
        match &arp_pdu.data {
            ProtocolData::Arp(a) => {
                assert_eq!(a.op, ArpOp::Request);
                assert_eq!(a.sender_ip, [10, 0, 0, 1]);
            }
            _ => panic!("expected arp pdu"),
        }
    }
}
