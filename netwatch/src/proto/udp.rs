//! UDP.

use crate::arena::Arena;
use crate::decode::decode_next;
use crate::error::DecodeError;
use crate::layer::{ip_proto, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

pub const HEADER_LEN: usize = 8;

pub struct UdpHandler {
    counters: Counters,
}

impl UdpHandler {
    pub fn new() -> Self {
        UdpHandler { counters: Counters::default() }
    }
}

impl Handler for UdpHandler {
    fn short_name(&self) -> &'static str {
        "udp"
    }
    fn long_name(&self) -> &'static str {
        "User Datagram Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let src_port = reader.u16_be()?;
        let dst_port = reader.u16_be()?;
        let length = reader.u16_be()?;
        let checksum = reader.u16_be()?;
        if (length as usize) < HEADER_LEN {
            return Err(DecodeError::Decode("UDP length shorter than its own header"));
        }
        let declared_payload = (length as usize) - HEADER_LEN;
        if declared_payload > reader.remaining() {
            return Err(DecodeError::Truncated("UDP length exceeds captured data"));
        }
        let payload_reader = reader.sub_reader(declared_payload)?;

        self.counters.record(length as usize);
        let (next, status) = {
            let first = decode_next(registry, arena, depth, Layer::Port, src_port as u32, payload_reader);
            if first.0.is_some() {
                first
            } else {
                decode_next(registry, arena, depth, Layer::Port, dst_port as u32, payload_reader)
            }
        };

        let pdu = arena.alloc(Pdu {
            layer: Layer::IpProto,
            key: ip_proto::UDP,
            id: registry.id_of(Layer::IpProto, ip_proto::UDP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: HEADER_LEN,
            data: ProtocolData::Udp(UdpHeader { src_port, dst_port, length, checksum }),
            next,
        });
        Ok(HandlerSuccess { pdu, status })
    }
}
