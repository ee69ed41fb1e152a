//! IGMP: membership query/report header recognition.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{ip_proto, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct IgmpPacket {
    pub msg_type: u8,
    pub max_resp_time: u8,
    pub checksum: u16,
    pub group_address: [u8; 4],
}

pub struct IgmpHandler {
    counters: Counters,
}

impl IgmpHandler {
    pub fn new() -> Self {
        IgmpHandler { counters: Counters::default() }
    }
}

impl Handler for IgmpHandler {
    fn short_name(&self) -> &'static str {
        "igmp"
    }
    fn long_name(&self) -> &'static str {
        "Internet Group Management Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let msg_type = reader.u8()?;
        let max_resp_time = reader.u8()?;
        let checksum = reader.u16_be()?;
        let mut group_address = [0u8; 4];
        group_address.copy_from_slice(reader.bytes(4)?);
        self.counters.record(8);
        let pdu = arena.alloc(Pdu {
            layer: Layer::IpProto,
            key: ip_proto::IGMP,
            id: registry.id_of(Layer::IpProto, ip_proto::IGMP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 8,
            data: ProtocolData::Igmp(IgmpPacket { msg_type, max_resp_time, checksum, group_address }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}
