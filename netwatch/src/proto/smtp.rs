//! SMTP: line-oriented command/reply recognition, first token only --
//! same scope as [`crate::proto::imap`].

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub enum SmtpLine<'p> {
    /// A client command, e.g. `MAIL FROM:<...>`.
    Command { verb: &'p [u8], rest: &'p [u8] },
    /// A server reply, `nnn[- ]text`.
    Reply { code: u16, rest: &'p [u8] },
}

fn first_line(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(buf.len());
    &buf[..end]
}

pub struct SmtpHandler {
    counters: Counters,
}

impl SmtpHandler {
    pub fn new() -> Self {
        SmtpHandler { counters: Counters::default() }
    }
}

impl Handler for SmtpHandler {
    fn short_name(&self) -> &'static str {
        "smtp"
    }
    fn long_name(&self) -> &'static str {
        "Simple Mail Transfer Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, reader: Reader<'p>) -> HandlerResult<'p> {
        let buf = reader.as_slice();
        let line = first_line(buf);

        let is_reply = line.len() >= 3 && line[..3].iter().all(|b| b.is_ascii_digit());
        let data = if is_reply {
            let code: u16 = std::str::from_utf8(&line[..3]).ok().and_then(|s| s.parse().ok()).unwrap_or(0);
            let rest = line.get(3..).unwrap_or(&[]);
            SmtpLine::Reply { code, rest: arena.alloc_copy(rest) }
        } else {
            let mut parts = line.splitn(2, |&b| b == b' ');
            let verb = parts.next().unwrap_or(&[]);
            let rest = parts.next().unwrap_or(&[]);
            SmtpLine::Command { verb: arena.alloc_copy(verb), rest: arena.alloc_copy(rest) }
        };

        self.counters.record(buf.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::SMTP,
            id: registry.id_of(Layer::Port, port::SMTP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: line.len(),
            data: ProtocolData::Smtp(data),
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
    fn recognizes_command_verb() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = SmtpHandler::new();
        let raw = b"MAIL FROM:<a@b.com>\r\n";
        let success = handler.decode(&registry, &arena, 0, Reader::new(raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Smtp(SmtpLine::Command { verb, .. }) => assert_eq!(*verb, b"MAIL"),
            _ => panic!("expected smtp command"),
        }
    }

    #[test]
    fn recognizes_numeric_reply_code() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = SmtpHandler::new();
        let raw = b"250 OK\r\n";
        let success = handler.decode(&registry, &arena, 0, Reader::new(raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Smtp(SmtpLine::Reply { code, .. }) => assert_eq!(*code, 250),
            _ => panic!("expected smtp reply"),
        }
    }
}
