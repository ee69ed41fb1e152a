//! IPv4 and IPv6.

use crate::arena::Arena;
use crate::decode::decode_next;
use crate::error::DecodeError;
use crate::layer::{ethertype, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct Ipv4Header<'p> {
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: [u8; 4],
    pub dst: [u8; 4],
    pub options: &'p [u8],
}

pub struct Ipv4Handler {
    counters: Counters,
}

impl Ipv4Handler {
    pub fn new() -> Self {
        Ipv4Handler { counters: Counters::default() }
    }
}

impl Handler for Ipv4Handler {
    fn short_name(&self) -> &'static str {
        "ipv4"
    }
    fn long_name(&self) -> &'static str {
        "Internet Protocol version 4"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let version_ihl = reader.u8()?;
        let version = version_ihl >> 4;
        let ihl = version_ihl & 0x0f;
        if version != 4 {
            return Err(DecodeError::Decode("not an IPv4 packet"));
        }
        if ihl < 5 {
            return Err(DecodeError::Decode("IPv4 ihl < 5"));
        }
        let header_len = ihl as usize * 4;
        if header_len > 1 + reader.remaining() {
            return Err(DecodeError::Decode("IPv4 ihl*4 exceeds captured length"));
        }

        let tos = reader.u8()?;
        let dscp = tos >> 2;
        let ecn = tos & 0x03;
        let total_length = reader.u16_be()?;
        let identification = reader.u16_be()?;
        let flags_frag = reader.u16_be()?;
        let flags = (flags_frag >> 13) as u8;
        let fragment_offset = flags_frag & 0x1fff;
        let ttl = reader.u8()?;
        let protocol = reader.u8()?;
        let checksum = reader.u16_be()?;
        let mut src = [0u8; 4];
        src.copy_from_slice(reader.bytes(4)?);
        let mut dst = [0u8; 4];
        dst.copy_from_slice(reader.bytes(4)?);

        if (total_length as usize) < header_len {
            return Err(DecodeError::Decode("IPv4 total length shorter than header"));
        }
        // `1 (version/ihl byte)` already consumed; header_len counts from
        // the start of the IP header, consumed-so-far is 20 bytes fixed.
        let consumed_fixed = 20;
        let options_len = header_len.saturating_sub(consumed_fixed);
        let options = reader.bytes(options_len)?;

        let captured_after_header = reader.remaining();
        let declared_payload = (total_length as usize).saturating_sub(header_len);
        if declared_payload > captured_after_header {
            return Err(DecodeError::Decode("IPv4 total length exceeds captured length"));
        }
        // Padding beyond the declared total length (e.g. minimum Ethernet
        // frame padding) is not part of this packet's payload.
        let payload_reader = reader.sub_reader(declared_payload)?;

        self.counters.record(header_len + declared_payload);
        let (next, status) = decode_next(registry, arena, depth, Layer::IpProto, protocol as u32, payload_reader);
        let pdu = arena.alloc(Pdu {
            layer: Layer::EtherType,
            key: ethertype::IPV4,
            id: registry.id_of(Layer::EtherType, ethertype::IPV4).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len,
            data: ProtocolData::Ipv4(Ipv4Header {
                ihl, dscp, ecn, total_length, identification, flags, fragment_offset,
                ttl, protocol, checksum, src, dst, options,
            }),
            next,
        });
        Ok(HandlerSuccess { pdu, status })
    }
}

pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

pub const IPV6_HEADER_LEN: usize = 40;

pub struct Ipv6Handler {
    counters: Counters,
}

impl Ipv6Handler {
    pub fn new() -> Self {
        Ipv6Handler { counters: Counters::default() }
    }
}

impl Handler for Ipv6Handler {
    fn short_name(&self) -> &'static str {
        "ipv6"
    }
    fn long_name(&self) -> &'static str {
        "Internet Protocol version 6"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    // Grounding note: one of the two source trees this is based on copies
    // a fallback IPv6 payload into the IPv4 union member (`eth->ip->payload`
    // instead of `eth->ipv6->payload`), and a sibling ethernet dispatcher
    // never wires ETH_P_IPV6 to a handler at all, falling into a generic
    // error branch. Neither condition is representable here: IPv6 is
    // registered under its own EtherType key exactly like IPv4, dispatches
    // through the same IpProto recursion, and owns its own `Ipv6Header`
    // variant rather than sharing IPv4's.
    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        if reader.remaining() < IPV6_HEADER_LEN {
            return Err(DecodeError::Truncated("IPv6 header shorter than 40 bytes"));
        }
        let word0 = reader.u32_be()?;
        let version = (word0 >> 28) as u8;
        if version != 6 {
            return Err(DecodeError::Decode("not an IPv6 packet"));
        }
        let traffic_class = ((word0 >> 20) & 0xff) as u8;
        let flow_label = word0 & 0x000f_ffff;
        let payload_length = reader.u16_be()?;
        let next_header = reader.u8()?;
        let hop_limit = reader.u8()?;
        let mut src = [0u8; 16];
        src.copy_from_slice(reader.bytes(16)?);
        let mut dst = [0u8; 16];
        dst.copy_from_slice(reader.bytes(16)?);

        let declared_payload = (payload_length as usize).min(reader.remaining());
        let payload_reader = reader.sub_reader(declared_payload)?;

        self.counters.record(IPV6_HEADER_LEN + declared_payload);
        let (next, status) = decode_next(registry, arena, depth, Layer::IpProto, next_header as u32, payload_reader);
        let pdu = arena.alloc(Pdu {
            layer: Layer::EtherType,
            key: ethertype::IPV6,
            id: registry.id_of(Layer::EtherType, ethertype::IPV6).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: IPV6_HEADER_LEN,
            data: ProtocolData::Ipv6(Ipv6Header { traffic_class, flow_label, payload_length, next_header, hop_limit, src, dst }),
            next,
        });
        Ok(HandlerSuccess { pdu, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::register_all;
    use crate::registry::Registry;

    fn eth_ipv4(total_len: u16, captured_payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&(ethertype::IPV4 as u16).to_be_bytes());
        f.push(0x45); // version 4, ihl 5
        f.push(0); // tos
        f.extend_from_slice(&total_len.to_be_bytes());
        f.extend_from_slice(&0u16.to_be_bytes()); // id
        f.extend_from_slice(&0u16.to_be_bytes()); // flags/frag
        f.push(64); // ttl
        f.push(6); // tcp
        f.extend_from_slice(&0u16.to_be_bytes()); // checksum
        f.extend_from_slice(&[10, 0, 0, 1]);
        f.extend_from_slice(&[10, 0, 0, 2]);
        f.extend_from_slice(captured_payload);
        f
    }

    #[test]
    fn s2_truncated_ipv4_is_decode_err_with_no_tcp_child() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        // tot_len=200 but only 20(ip header)+40 bytes captured => 60 total.
        let frame = eth_ipv4(200, &[0u8; 40]);
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        assert!(matches!(pkt.status, crate::error::PacketStatus::DecodeErr(_)));
        let ip_pdu = pkt.root.next.expect("ipv4 pdu still built");
        assert!(ip_pdu.next.is_none(), "no tcp child on truncated ip payload");
    }

    #[test]
    fn ipv4_with_exact_capture_dispatches_to_ip_proto() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let mut tcp = vec![0u8; 20];
        tcp[12] = 0x50; // data offset = 5, no options
        let frame = eth_ipv4(20 + 20, &tcp);
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        let ip_pdu = pkt.root.next.unwrap();
        assert!(ip_pdu.next.is_some(), "valid tcp header should produce a tcp pdu");
    }
}
