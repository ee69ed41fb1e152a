//! HTTP: request/response start line and header fields only, no body
//! parsing -- matches the "representative subset" scope.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub struct HttpMessage<'p> {
    pub start_line: &'p [u8],
    pub headers: Vec<(&'p [u8], &'p [u8])>,
    pub body: &'p [u8],
}

fn split_lines(buf: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let end = if i > start && buf[i - 1] == b'\r' { i - 1 } else { i };
            lines.push(&buf[start..end]);
            start = i + 1;
        }
        i += 1;
    }
    lines
}

pub struct HttpHandler {
    counters: Counters,
}

impl HttpHandler {
    pub fn new() -> Self {
        HttpHandler { counters: Counters::default() }
    }
}

impl Handler for HttpHandler {
    fn short_name(&self) -> &'static str {
        "http"
    }
    fn long_name(&self) -> &'static str {
        "Hypertext Transfer Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, reader: Reader<'p>) -> HandlerResult<'p> {
        let buf = reader.as_slice();
        let lines = split_lines(buf);
        let start_line = lines.first().copied().unwrap_or(&[]);

        let mut headers = Vec::new();
        let mut header_end = buf.len();
        let mut consumed = start_line.len() + if lines.len() > 1 { 2 } else { 0 };
        for line in lines.iter().skip(1) {
            if line.is_empty() {
                consumed += 2;
                break;
            }
            if let Some(colon) = line.iter().position(|&b| b == b':') {
                let name = &line[..colon];
                let mut value_start = colon + 1;
                while value_start < line.len() && line[value_start] == b' ' {
                    value_start += 1;
                }
                headers.push((arena.alloc_copy(name), arena.alloc_copy(&line[value_start..])));
            }
            consumed += line.len() + 2;
            header_end = consumed;
        }
        let body_start = header_end.min(buf.len());
        let body = &buf[body_start..];

        self.counters.record(buf.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::HTTP,
            id: registry.id_of(Layer::Port, port::HTTP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: body_start,
            data: ProtocolData::Http(HttpMessage { start_line: arena.alloc_copy(start_line), headers, body: arena.alloc_copy(body) }),
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
    fn parses_start_line_and_headers() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = HttpHandler::new();
        let raw = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\nbody";
        let success = handler.decode(&registry, &arena, 0, Reader::new(raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Http(m) => {
                assert_eq!(m.start_line, b"GET / HTTP/1.1");
                assert_eq!(m.headers[0], (&b"Host"[..], &b"example.com"[..]));
                assert_eq!(m.body, b"body");
            }
            _ => panic!("expected http pdu"),
        }
    }
}
