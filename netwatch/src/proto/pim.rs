//! PIM: header-only recognizer (version/type byte and checksum), matching
//! the "representative subset" scope -- no join/prune/assert payload
//! parsing.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{ip_proto, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct PimHeader {
    pub version: u8,
    pub pim_type: u8,
    pub checksum: u16,
}

pub struct PimHandler {
    counters: Counters,
}

impl PimHandler {
    pub fn new() -> Self {
        PimHandler { counters: Counters::default() }
    }
}

impl Handler for PimHandler {
    fn short_name(&self) -> &'static str {
        "pim"
    }
    fn long_name(&self) -> &'static str {
        "Protocol Independent Multicast"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let version_type = reader.u8()?;
        let _reserved = reader.u8()?;
        let checksum = reader.u16_be()?;
        self.counters.record(4);
        let pdu = arena.alloc(Pdu {
            layer: Layer::IpProto,
            key: ip_proto::PIM,
            id: registry.id_of(Layer::IpProto, ip_proto::PIM).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 4,
            data: ProtocolData::Pim(PimHeader { version: version_type >> 4, pim_type: version_type & 0x0f, checksum }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}
