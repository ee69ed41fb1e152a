//! TLS: record header and, for handshake records, the handshake message
//! type -- no cipher-suite negotiation or certificate parsing.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsHandshakeType {
    ClientHello,
    ServerHello,
    Certificate,
    ServerHelloDone,
    Finished,
    Other(u8),
}

pub struct TlsRecord {
    pub content_type: TlsContentType,
    pub version: u16,
    pub length: u16,
    pub handshake_type: Option<TlsHandshakeType>,
}

pub struct TlsHandler {
    counters: Counters,
}

impl TlsHandler {
    pub fn new() -> Self {
        TlsHandler { counters: Counters::default() }
    }
}

impl Handler for TlsHandler {
    fn short_name(&self) -> &'static str {
        "tls"
    }
    fn long_name(&self) -> &'static str {
        "Transport Layer Security"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let type_byte = reader.u8()?;
        let content_type = match type_byte {
            20 => TlsContentType::ChangeCipherSpec,
            21 => TlsContentType::Alert,
            22 => TlsContentType::Handshake,
            23 => TlsContentType::ApplicationData,
            other => TlsContentType::Other(other),
        };
        let version = reader.u16_be()?;
        let length = reader.u16_be()?;
        if length as usize > reader.remaining() {
            return Err(DecodeError::Truncated("TLS record length exceeds captured data"));
        }

        let handshake_type = if content_type == TlsContentType::Handshake && length >= 1 {
            match reader.peek_u8()? {
                1 => Some(TlsHandshakeType::ClientHello),
                2 => Some(TlsHandshakeType::ServerHello),
                11 => Some(TlsHandshakeType::Certificate),
                14 => Some(TlsHandshakeType::ServerHelloDone),
                20 => Some(TlsHandshakeType::Finished),
                other => Some(TlsHandshakeType::Other(other)),
            }
        } else {
            None
        };

        self.counters.record(5 + length as usize);
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::TLS,
            id: registry.id_of(Layer::Port, port::TLS).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 5,
            data: ProtocolData::Tls(TlsRecord { content_type, version, length, handshake_type }),
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
    fn recognizes_client_hello() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = TlsHandler::new();
        let mut raw = vec![22u8]; // handshake
        raw.extend_from_slice(&0x0301u16.to_be_bytes()); // TLS 1.0 record version
        raw.extend_from_slice(&4u16.to_be_bytes());
        raw.extend_from_slice(&[1, 0, 0, 1]); // handshake type=ClientHello, length=1
        let success = handler.decode(&registry, &arena, 0, Reader::new(&raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Tls(r) => assert_eq!(r.handshake_type, Some(TlsHandshakeType::ClientHello)),
            _ => panic!("expected tls pdu"),
        }
    }
}
