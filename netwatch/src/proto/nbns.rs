//! NetBIOS Name Service. Shares DNS's message envelope (id/flags/counts)
//! but its resource-record data is a NetBIOS-specific `NB_ADDRESS` array
//! (flags + IPv4 address, repeated) rather than typed DNS rdata.
//!
//! Grounding bug: the record parser this is based on indexes the address
//! array with the outer resource-record loop variable instead of its own
//! inner loop variable, so with more than one answer record every address
//! after the first reads from the wrong record's bytes. Here each address
//! is read by its own `addr_index`, scoped to the record it belongs to.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::dns::parse_name;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub const TYPE_NB: u16 = 0x0020;

pub struct NbAddress {
    pub group: bool,
    pub node_type: u8,
    pub address: [u8; 4],
}

pub struct NbnsRecord<'p> {
    pub name: &'p [u8],
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub addresses: Vec<NbAddress>,
}

pub struct NbnsMessage<'p> {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub answers: Vec<NbnsRecord<'p>>,
}

fn u16_at(msg: &[u8], off: usize) -> Result<u16, DecodeError> {
    msg.get(off..off + 2).map(|b| u16::from_be_bytes([b[0], b[1]])).ok_or(DecodeError::Truncated("nbns field past message end"))
}

fn parse_record<'p>(arena: &'p Arena, msg: &'p [u8], reader: &mut Reader<'p>) -> Result<NbnsRecord<'p>, DecodeError> {
    let (name, consumed) = parse_name(arena, msg, reader.pos())?;
    reader.skip(consumed)?;
    let rtype = reader.u16_be()?;
    let rclass = reader.u16_be()?;
    let ttl = reader.u32_be()?;
    let rdlength = reader.u16_be()? as usize;
    let rdata_start = reader.pos();
    reader.skip(rdlength)?;

    let mut addresses = Vec::new();
    if rtype == TYPE_NB {
        let num_addrs = rdlength / 6;
        for addr_index in 0..num_addrs {
            // `addr_index`, not the caller's record index, selects which
            // 6-byte (flags, address) entry this is: the fix for the
            // indexing bug described above.
            let entry_off = rdata_start + addr_index * 6;
            let flags = u16_at(msg, entry_off)?;
            let addr_bytes = msg.get(entry_off + 2..entry_off + 6).ok_or(DecodeError::Truncated("NB_ADDRESS entry truncated"))?;
            let mut address = [0u8; 4];
            address.copy_from_slice(addr_bytes);
            addresses.push(NbAddress { group: flags & 0x8000 != 0, node_type: ((flags >> 13) & 0x3) as u8, address });
        }
    }

    Ok(NbnsRecord { name, rtype, rclass, ttl, addresses })
}

pub struct NbnsHandler {
    counters: Counters,
}

impl NbnsHandler {
    pub fn new() -> Self {
        NbnsHandler { counters: Counters::default() }
    }
}

impl Handler for NbnsHandler {
    fn short_name(&self) -> &'static str {
        "nbns"
    }
    fn long_name(&self) -> &'static str {
        "NetBIOS Name Service"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let msg = reader.as_slice();
        if msg.len() < 12 {
            return Err(DecodeError::Truncated("nbns header shorter than 12 bytes"));
        }
        let id = reader.u16_be()?;
        let flags = reader.u16_be()?;
        let qr = flags & 0x8000 != 0;
        let opcode = ((flags >> 11) & 0x0f) as u8;
        let qdcount = reader.u16_be()?;
        let ancount = reader.u16_be()?;
        let nscount = reader.u16_be()?;
        let arcount = reader.u16_be()?;
        if ancount as usize + nscount as usize + arcount as usize > msg.len() {
            return Err(DecodeError::Decode("nbns record count exceeds message size"));
        }

        for _ in 0..qdcount {
            let (_, consumed) = parse_name(arena, msg, reader.pos())?;
            reader.skip(consumed)?;
            reader.skip(4)?; // qtype + qclass
        }
        let mut answers = Vec::with_capacity(ancount as usize);
        for _ in 0..ancount {
            answers.push(parse_record(arena, msg, &mut reader)?);
        }

        self.counters.record(msg.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::NBNS,
            id: registry.id_of(Layer::Port, port::NBNS).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 12,
            data: ProtocolData::Nbns(NbnsMessage { id, qr, opcode, answers }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn label(s: &str) -> Vec<u8> {
        let mut v = vec![s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn second_records_addresses_are_not_shifted_by_the_first() {
        let mut msg = Vec::new();
        msg.extend_from_slice(&1u16.to_be_bytes()); // id
        msg.extend_from_slice(&0x8400u16.to_be_bytes()); // response, authoritative
        msg.extend_from_slice(&0u16.to_be_bytes()); // qdcount
        msg.extend_from_slice(&2u16.to_be_bytes()); // ancount = 2
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&0u16.to_be_bytes());

        // Record 1: one address.
        msg.extend(label("HOSTA"));
        msg.push(0);
        msg.extend_from_slice(&TYPE_NB.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&0u32.to_be_bytes());
        msg.extend_from_slice(&6u16.to_be_bytes()); // rdlength: one 6-byte entry
        msg.extend_from_slice(&0u16.to_be_bytes()); // flags
        msg.extend_from_slice(&[10, 0, 0, 1]);

        // Record 2: two addresses -- a naive "index by outer record number"
        // bug would read record 2's *second* address using the record-1
        // index (0) and get the wrong bytes.
        msg.extend(label("HOSTB"));
        msg.push(0);
        msg.extend_from_slice(&TYPE_NB.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&0u32.to_be_bytes());
        msg.extend_from_slice(&12u16.to_be_bytes()); // rdlength: two 6-byte entries
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&[10, 0, 0, 2]);
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&[10, 0, 0, 3]);

        let arena = Arena::new();
        let registry = Registry::new();
        let handler = NbnsHandler::new();
        let success = handler.decode(&registry, &arena, 0, Reader::new(&msg)).unwrap();
        match &success.pdu.data {
            ProtocolData::Nbns(m) => {
                assert_eq!(m.answers.len(), 2);
                assert_eq!(m.answers[1].addresses.len(), 2);
                assert_eq!(m.answers[1].addresses[0].address, [10, 0, 0, 2]);
                assert_eq!(m.answers[1].addresses[1].address, [10, 0, 0, 3]);
            }
            _ => panic!("expected nbns pdu"),
        }
    }
}
