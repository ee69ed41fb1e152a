//! IMAP: line-oriented command/reply recognition, first token only --
//! mirrors the HTTP request/response-line-only scope.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct ImapLine<'p> {
    pub tag: &'p [u8],
    pub keyword: &'p [u8],
}

fn first_line(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(buf.len());
    &buf[..end]
}

pub struct ImapHandler {
    counters: Counters,
}

impl ImapHandler {
    pub fn new() -> Self {
        ImapHandler { counters: Counters::default() }
    }
}

impl Handler for ImapHandler {
    fn short_name(&self) -> &'static str {
        "imap"
    }
    fn long_name(&self) -> &'static str {
        "Internet Message Access Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, reader: Reader<'p>) -> HandlerResult<'p> {
        let buf = reader.as_slice();
        let line = first_line(buf);
        let mut parts = line.splitn(2, |&b| b == b' ');
        let tag = parts.next().unwrap_or(&[]);
        let rest = parts.next().unwrap_or(&[]);
        let keyword = rest.split(|&b| b == b' ').next().unwrap_or(&[]);

        self.counters.record(buf.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::IMAP,
            id: registry.id_of(Layer::Port, port::IMAP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: line.len(),
            data: ProtocolData::Imap(ImapLine { tag: arena.alloc_copy(tag), keyword: arena.alloc_copy(keyword) }),
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
    fn recognizes_tag_and_keyword() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = ImapHandler::new();
        let raw = b"a001 LOGIN user pass\r\n";
        let success = handler.decode(&registry, &arena, 0, Reader::new(raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Imap(l) => {
                assert_eq!(l.tag, b"a001");
                assert_eq!(l.keyword, b"LOGIN");
            }
            _ => panic!("expected imap pdu"),
        }
    }
}
