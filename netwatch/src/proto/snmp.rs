//! SNMP: BER/ASN.1 subset covering the message envelope (version,
//! community, PDU type tag) per `packet_snmp.h`'s `snmp_info`. Varbind
//! contents are not decoded -- that is left as opaque BER bytes, matching
//! the "representative subset" scope.

use crate::arena::Arena;
use crate::error::DecodeError;
use crate::error::PacketStatus;
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpPduType {
    GetRequest,
    GetNextRequest,
    GetResponse,
    SetRequest,
    Trap,
    Other(u8),
}

pub struct SnmpMessage<'p> {
    pub version: i32,
    pub community: &'p [u8],
    pub pdu_type: SnmpPduType,
    pub pdu_body: &'p [u8],
}

/// Read a BER tag+length header, returning `(tag, content_len, header_len)`.
/// Only the definite-length short and long forms are supported.
fn ber_header(buf: &[u8]) -> Result<(u8, usize, usize), DecodeError> {
    let tag = *buf.first().ok_or(DecodeError::Truncated("BER tag missing"))?;
    let first_len = *buf.get(1).ok_or(DecodeError::Truncated("BER length missing"))?;
    if first_len & 0x80 == 0 {
        Ok((tag, first_len as usize, 2))
    } else {
        let num_octets = (first_len & 0x7f) as usize;
        if num_octets == 0 || num_octets > 4 {
            return Err(DecodeError::Decode("BER indefinite or oversized length form unsupported"));
        }
        let octets = buf.get(2..2 + num_octets).ok_or(DecodeError::Truncated("BER long-form length truncated"))?;
        let mut len = 0usize;
        for &b in octets {
            len = (len << 8) | b as usize;
        }
        Ok((tag, len, 2 + num_octets))
    }
}

fn ber_integer(buf: &[u8]) -> Result<i32, DecodeError> {
    let (tag, len, hlen) = ber_header(buf)?;
    if tag != TAG_INTEGER {
        return Err(DecodeError::Decode("expected BER INTEGER tag"));
    }
    let content = buf.get(hlen..hlen + len).ok_or(DecodeError::Truncated("BER INTEGER content truncated"))?;
    let mut value: i32 = 0;
    for &b in content {
        value = (value << 8) | b as i32;
    }
    Ok(value)
}

fn ber_octet_string(buf: &[u8]) -> Result<&[u8], DecodeError> {
    let (tag, len, hlen) = ber_header(buf)?;
    if tag != TAG_OCTET_STRING {
        return Err(DecodeError::Decode("expected BER OCTET STRING tag"));
    }
    buf.get(hlen..hlen + len).ok_or(DecodeError::Truncated("BER OCTET STRING content truncated"))
}

pub struct SnmpHandler {
    counters: Counters,
}

impl SnmpHandler {
    pub fn new() -> Self {
        SnmpHandler { counters: Counters::default() }
    }
}

impl Handler for SnmpHandler {
    fn short_name(&self) -> &'static str {
        "snmp"
    }
    fn long_name(&self) -> &'static str {
        "Simple Network Management Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, reader: Reader<'p>) -> HandlerResult<'p> {
        let buf = reader.as_slice();
        let (outer_tag, outer_len, outer_hlen) = ber_header(buf)?;
        if outer_tag != TAG_SEQUENCE {
            return Err(DecodeError::Decode("SNMP message is not a BER SEQUENCE"));
        }
        let body = buf.get(outer_hlen..outer_hlen + outer_len).ok_or(DecodeError::Truncated("SNMP message shorter than declared SEQUENCE length"))?;

        let version = ber_integer(body)?;
        let (_, version_len, version_hlen) = ber_header(body)?;
        let after_version = &body[version_hlen + version_len..];

        let community = ber_octet_string(after_version)?;
        let (_, community_len, community_hlen) = ber_header(after_version)?;
        let after_community = &after_version[community_hlen + community_len..];

        let pdu_tag = *after_community.first().ok_or(DecodeError::Truncated("SNMP PDU tag missing"))?;
        let pdu_type = match pdu_tag & 0x1f {
            0 => SnmpPduType::GetRequest,
            1 => SnmpPduType::GetNextRequest,
            2 => SnmpPduType::GetResponse,
            3 => SnmpPduType::SetRequest,
            4 => SnmpPduType::Trap,
            other => SnmpPduType::Other(other),
        };

        self.counters.record(buf.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::SNMP,
            id: registry.id_of(Layer::Port, port::SNMP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: buf.len() - after_community.len(),
            data: ProtocolData::Snmp(SnmpMessage { version, community: arena.alloc_copy(community), pdu_type, pdu_body: arena.alloc_copy(after_community) }),
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
    fn parses_version_and_community() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = SnmpHandler::new();

        // SEQUENCE { INTEGER version=0(v1), OCTET STRING "public", [0] GetRequest-PDU (empty) }
        let mut pdu_body = vec![0xa0, 0x02, 0x02, 0x00]; // GetRequest tag, len 2: request-id INTEGER 0 (truncated stand-in)
        let mut body = vec![0x02, 0x01, 0x00]; // version INTEGER 0
        body.extend_from_slice(&[0x04, 0x06]);
        body.extend_from_slice(b"public");
        body.append(&mut pdu_body);
        let mut msg = vec![0x30, body.len() as u8];
        msg.extend_from_slice(&body);

        let success = handler.decode(&registry, &arena, 0, Reader::new(&msg)).unwrap();
        match &success.pdu.data {
            ProtocolData::Snmp(m) => {
                assert_eq!(m.version, 0);
                assert_eq!(m.community, b"public");
                assert_eq!(m.pdu_type, SnmpPduType::GetRequest);
            }
            _ => panic!("expected snmp pdu"),
        }
    }
}
