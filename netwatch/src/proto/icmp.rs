//! ICMP and ICMPv6: header recognition only, no per-type payload decoding
//! beyond the generic 4-byte "rest of header" field.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{ip_proto, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct IcmpPacket<'p> {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub rest_of_header: u32,
    pub payload: &'p [u8],
}

macro_rules! icmp_like_handler {
    ($name:ident, $short:literal, $long:literal, $layer_key:expr, $variant:ident) => {
        pub struct $name {
            counters: Counters,
        }

        impl $name {
            pub fn new() -> Self {
                $name { counters: Counters::default() }
            }
        }

        impl Handler for $name {
            fn short_name(&self) -> &'static str {
                $short
            }
            fn long_name(&self) -> &'static str {
                $long
            }
            fn counters(&self) -> &Counters {
                &self.counters
            }

            fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
                let icmp_type = reader.u8()?;
                let code = reader.u8()?;
                let checksum = reader.u16_be()?;
                let rest_of_header = reader.u32_be()?;
                let payload = reader.as_slice();
                self.counters.record(8 + payload.len());
                let pdu = arena.alloc(Pdu {
                    layer: Layer::IpProto,
                    key: $layer_key,
                    id: registry.id_of(Layer::IpProto, $layer_key).unwrap_or(u32::MAX),
                    short_name: self.short_name(),
                    header_len: 8,
                    data: ProtocolData::$variant(IcmpPacket { icmp_type, code, checksum, rest_of_header, payload }),
                    next: None,
                });
                Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
            }
        }
    };
}

icmp_like_handler!(IcmpHandler, "icmp", "Internet Control Message Protocol", ip_proto::ICMP, Icmp);
icmp_like_handler!(Icmpv6Handler, "icmpv6", "ICMP for IPv6", ip_proto::IPV6_ICMP, Icmpv6);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::register_all;
    use crate::registry::Registry;

    #[test]
    fn icmp_echo_request_header_decodes() {
        let arena = Arena::new();
        let mut registry = Registry::new();
        register_all(&mut registry);
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&(crate::layer::ethertype::IPV4 as u16).to_be_bytes());
        frame.push(0x45);
        frame.push(0);
        frame.extend_from_slice(&(20 + 8u16).to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        frame.push(64);
        frame.push(ip_proto::ICMP as u8);
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&[10, 0, 0, 1]);
        frame.extend_from_slice(&[10, 0, 0, 2]);
        frame.extend_from_slice(&[8, 0, 0, 0, 0, 0, 0, 0]); // echo request
        let pkt = crate::decode::decode(&registry, &arena, 0, 0, 0, frame.len(), &frame);
        let icmp_pdu = pkt.root.next.unwrap().next.expect("icmp pdu present");
        match &icmp_pdu.data {
            ProtocolData::Icmp(p) => assert_eq!(p.icmp_type, 8),
            _ => panic!("expected icmp pdu"),
        }
    }
}
