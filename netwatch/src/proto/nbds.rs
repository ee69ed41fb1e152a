//! NetBIOS Datagram Service: header-only recognizer (msg type and
//! source name/port), matching the representative-subset depth used for
//! PIM.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct NbdsHeader {
    pub msg_type: u8,
    pub flags: u8,
    pub dgm_id: u16,
    pub src_ip: [u8; 4],
    pub src_port: u16,
}

pub struct NbdsHandler {
    counters: Counters,
}

impl NbdsHandler {
    pub fn new() -> Self {
        NbdsHandler { counters: Counters::default() }
    }
}

impl Handler for NbdsHandler {
    fn short_name(&self) -> &'static str {
        "nbds"
    }
    fn long_name(&self) -> &'static str {
        "NetBIOS Datagram Service"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let msg_type = reader.u8()?;
        let flags = reader.u8()?;
        let dgm_id = reader.u16_be()?;
        let mut src_ip = [0u8; 4];
        src_ip.copy_from_slice(reader.bytes(4)?);
        let src_port = reader.u16_be()?;
        self.counters.record(10);
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::NBDS,
            id: registry.id_of(Layer::Port, port::NBDS).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 10,
            data: ProtocolData::Nbds(NbdsHeader { msg_type, flags, dgm_id, src_ip, src_port }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}
