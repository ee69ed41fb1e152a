//! Ethernet II and 802.3 + LLC framing.

use crate::arena::Arena;
use crate::decode::decode_next;
use crate::error::DecodeError;
use crate::layer::{ethertype, llc, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, Registry};

pub const HEADER_LEN: usize = 14;
/// Fields below this value are an 802.3 length, not an EtherType.
const MIN_ETHERTYPE: u16 = 0x0600;

pub struct EthernetFrame<'p> {
    pub mac_dst: [u8; 6],
    pub mac_src: [u8; 6],
    /// Either an EtherType (>= 0x0600) or an 802.3 length field.
    pub ethertype_or_len: u16,
    pub payload: &'p [u8],
}

pub struct EthernetHandler {
    counters: Counters,
}

impl EthernetHandler {
    pub fn new() -> Self {
        EthernetHandler { counters: Counters::default() }
    }
}

impl Handler for EthernetHandler {
    fn short_name(&self) -> &'static str {
        "eth"
    }
    fn long_name(&self) -> &'static str {
        "Ethernet"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let mut mac_dst = [0u8; 6];
        let mut mac_src = [0u8; 6];
        mac_dst.copy_from_slice(reader.bytes(6)?);
        mac_src.copy_from_slice(reader.bytes(6)?);
        let field = reader.u16_be()?;
        let payload = reader.as_slice();

        self.counters.record(HEADER_LEN + reader.remaining());

        let (next, status) = if field < MIN_ETHERTYPE {
            // 802.3: `field` is a length, not an EtherType. The byte right
            // after it is the LLC DSAP, which picks the Llc802 key.
            let dsap = match reader.peek_u8() {
                Ok(b) => b as u32,
                Err(_) => return Err(DecodeError::Truncated("802.3 frame missing LLC header")),
            };
            decode_next(registry, arena, depth, Layer::Llc802, dsap, reader)
        } else {
            decode_next(registry, arena, depth, Layer::EtherType, field as u32, reader)
        };

        let pdu = arena.alloc(Pdu {
            layer: Layer::Link,
            key: crate::layer::LINK_ETHERNET,
            id: registry.id_of(Layer::Link, crate::layer::LINK_ETHERNET).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: HEADER_LEN,
            data: ProtocolData::Ethernet(EthernetFrame { mac_dst, mac_src, ethertype_or_len: field, payload }),
            next,
        });
        Ok(crate::registry::HandlerSuccess { pdu, status })
    }
}

/// 802.2 LLC header shared by the STP and SNAP handlers.
pub struct LlcHeader {
    pub dsap: u8,
    pub ssap: u8,
    pub control: u8,
}

fn parse_llc(reader: &mut Reader<'_>) -> Result<LlcHeader, DecodeError> {
    let dsap = reader.u8()?;
    let ssap = reader.u8()?;
    let control = reader.u8()?;
    Ok(LlcHeader { dsap, ssap, control })
}

pub struct SnapFrame {
    pub llc: LlcHeader,
    pub oui: [u8; 3],
    pub protocol_id: u16,
}

pub struct SnapHandler {
    counters: Counters,
}

impl SnapHandler {
    pub fn new() -> Self {
        SnapHandler { counters: Counters::default() }
    }
}

impl Handler for SnapHandler {
    fn short_name(&self) -> &'static str {
        "snap"
    }
    fn long_name(&self) -> &'static str {
        "Subnetwork Access Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let llc = parse_llc(&mut reader)?;
        if llc.dsap != llc::SNAP as u8 || llc.ssap != llc::SNAP as u8 {
            return Err(DecodeError::Decode("SNAP dsap/ssap mismatch"));
        }
        let mut oui = [0u8; 3];
        oui.copy_from_slice(reader.bytes(3)?);
        let protocol_id = reader.u16_be()?;
        self.counters.record(6 + reader.remaining());

        let (next, status) = decode_next(registry, arena, depth, Layer::EtherType, protocol_id as u32, reader);
        let pdu = arena.alloc(Pdu {
            layer: Layer::Llc802,
            key: llc::SNAP,
            id: registry.id_of(Layer::Llc802, llc::SNAP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 8,
            data: ProtocolData::Snap(SnapFrame { llc, oui, protocol_id }),
            next,
        });
        Ok(crate::registry::HandlerSuccess { pdu, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::register_all;

    fn eth_ii(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0u8; 14];
        f[0..6].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        f[6..12].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        f[12..14].copy_from_slice(&ethertype.to_be_bytes());
        f.extend_from_slice(payload);
        f
    }

    #[test]
    fn unknown_ethertype_yields_unk_protocol_not_an_error() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let frame = eth_ii(0x1234, &[]);
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        assert_eq!(pkt.status, crate::error::PacketStatus::UnkProtocol);
    }

    #[test]
    fn ethernet_ii_dispatches_to_arp() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let frame = eth_ii(ethertype::ARP, &[0u8; 28]);
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        match &pkt.root.data {
            ProtocolData::Ethernet(f) => assert_eq!(f.ethertype_or_len, ethertype::ARP as u16),
            _ => panic!("expected ethernet pdu"),
        }
        assert!(pkt.root.next.is_some());
    }
}
