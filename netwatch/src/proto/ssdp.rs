//! SSDP: the text-based HTTP-alike used for UPnP discovery. Grounded
//! directly on `packet_ssdp.c`'s `parse_ssdp`, which just splits the
//! message on CRLF into a flat list of header-field strings -- there is
//! no start-line/body distinction drawn in the source.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct SsdpMessage<'p> {
    pub fields: Vec<&'p [u8]>,
}

pub struct SsdpHandler {
    counters: Counters,
}

impl SsdpHandler {
    pub fn new() -> Self {
        SsdpHandler { counters: Counters::default() }
    }
}

impl Handler for SsdpHandler {
    fn short_name(&self) -> &'static str {
        "ssdp"
    }
    fn long_name(&self) -> &'static str {
        "Simple Service Discovery Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, reader: Reader<'p>) -> HandlerResult<'p> {
        let buf = reader.as_slice();
        let fields = buf
            .split(|&b| b == b'\r' || b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| arena.alloc_copy(line))
            .collect();

        self.counters.record(buf.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::SSDP,
            id: registry.id_of(Layer::Port, port::SSDP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: buf.len(),
            data: ProtocolData::Ssdp(SsdpMessage { fields }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn splits_on_crlf_into_flat_fields() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = SsdpHandler::new();
        let raw = b"NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\n\r\n";
        let success = handler.decode(&registry, &arena, 0, Reader::new(raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Ssdp(m) => assert_eq!(m.fields.len(), 2),
            _ => panic!("expected ssdp pdu"),
        }
    }
}
