//! DHCP: BOOTP fixed header plus the option TLV walk (magic cookie +
//! tag/len/value), stopping at the `END` option.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];
const OPT_PAD: u8 = 0;
const OPT_END: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpOp {
    BootRequest,
    BootReply,
    Other(u8),
}

pub struct DhcpOption<'p> {
    pub tag: u8,
    pub data: &'p [u8],
}

pub struct DhcpMessage<'p> {
    pub op: DhcpOp,
    pub xid: u32,
    pub your_ip: [u8; 4],
    pub server_ip: [u8; 4],
    pub client_mac: [u8; 6],
    pub options: Vec<DhcpOption<'p>>,
}

pub struct DhcpHandler {
    counters: Counters,
}

impl DhcpHandler {
    pub fn new() -> Self {
        DhcpHandler { counters: Counters::default() }
    }
}

impl Handler for DhcpHandler {
    fn short_name(&self) -> &'static str {
        "dhcp"
    }
    fn long_name(&self) -> &'static str {
        "Dynamic Host Configuration Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let op = match reader.u8()? {
            1 => DhcpOp::BootRequest,
            2 => DhcpOp::BootReply,
            other => DhcpOp::Other(other),
        };
        let _htype = reader.u8()?;
        let _hlen = reader.u8()?;
        let _hops = reader.u8()?;
        let xid = reader.u32_be()?;
        let _secs = reader.u16_be()?;
        let _flags = reader.u16_be()?;
        let _client_ip = reader.bytes(4)?;
        let mut your_ip = [0u8; 4];
        your_ip.copy_from_slice(reader.bytes(4)?);
        let mut server_ip = [0u8; 4];
        server_ip.copy_from_slice(reader.bytes(4)?);
        let _gateway_ip = reader.bytes(4)?;
        let mut client_mac = [0u8; 6];
        client_mac.copy_from_slice(reader.bytes(6)?);
        reader.skip(10)?; // remainder of chaddr (16 bytes total)
        reader.skip(64)?; // sname
        reader.skip(128)?; // file
        let cookie = reader.bytes(4)?;
        if cookie != MAGIC_COOKIE {
            return Err(DecodeError::Decode("DHCP magic cookie mismatch"));
        }

        let mut options = Vec::new();
        loop {
            let tag = match reader.u8() {
                Ok(t) => t,
                Err(_) => break,
            };
            if tag == OPT_END {
                break;
            }
            if tag == OPT_PAD {
                continue;
            }
            let len = match reader.u8() {
                Ok(l) => l,
                Err(_) => break,
            };
            let data = match reader.bytes(len as usize) {
                Ok(d) => d,
                Err(_) => break,
            };
            options.push(DhcpOption { tag, data: arena.alloc_copy(data) });
        }

        self.counters.record(240);
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::DHCP,
            id: registry.id_of(Layer::Port, port::DHCP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 240,
            data: ProtocolData::Dhcp(DhcpMessage { op, xid, your_ip, server_ip, client_mac, options }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn minimal_discover() -> Vec<u8> {
        let mut m = vec![0u8; 236];
        m[0] = 1; // BOOTREQUEST
        m.extend_from_slice(&MAGIC_COOKIE);
        m.extend_from_slice(&[53, 1, 1]); // option 53 DHCPDISCOVER
        m.push(OPT_END);
        m
    }

    #[test]
    fn parses_fixed_header_and_options() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = DhcpHandler::new();
        let msg = minimal_discover();
        let success = handler.decode(&registry, &arena, 0, Reader::new(&msg)).unwrap();
        match &success.pdu.data {
            ProtocolData::Dhcp(m) => {
                assert_eq!(m.op, DhcpOp::BootRequest);
                assert_eq!(m.options.len(), 1);
                assert_eq!(m.options[0].tag, 53);
            }
            _ => panic!("expected dhcp pdu"),
        }
    }
}
