//! DNS message parsing, including compression-pointer names.
//!
//! Grounding note: the source this is based on follows compression
//! pointers with only an `offset > n` bounds check and no record of which
//! offsets have already been visited, so a label pointing back at itself
//! (or at a cycle of offsets) loops forever. [`parse_name`] below instead
//! walks iteratively with a visited-offset set and a hop budget, so any
//! cycle is rejected as `DECODE_ERR` in bounded time (scenario S6).

use std::collections::HashSet;

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

pub const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;
/// Matches `DNS_NAMELEN` in the grounding source (includes the
/// terminating NUL in the C original; the Rust name excludes it, so the
/// printable bound invariant 8 checks is 253).
const DNS_NAMELEN: usize = 254;
const MAX_POINTER_HOPS: usize = 128;

pub struct DnsQuestion<'p> {
    pub name: &'p [u8],
    pub qtype: u16,
    pub qclass: u16,
}

pub enum DnsRData<'p> {
    A([u8; 4]),
    Aaaa([u8; 16]),
    Ns(&'p [u8]),
    Cname(&'p [u8]),
    Ptr(&'p [u8]),
    Soa { mname: &'p [u8], rname: &'p [u8], serial: u32, refresh: u32, retry: u32, expire: u32, minimum: u32 },
    Hinfo { cpu: &'p [u8], os: &'p [u8] },
    Txt(Vec<&'p [u8]>),
    Mx { preference: u16, exchange: &'p [u8] },
    Srv { priority: u16, weight: u16, port: u16, target: &'p [u8] },
    Opt(&'p [u8]),
    Other(&'p [u8]),
}

pub struct DnsRecord<'p> {
    pub name: &'p [u8],
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: DnsRData<'p>,
}

pub struct DnsMessage<'p> {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: u8,
    pub questions: Vec<DnsQuestion<'p>>,
    pub answers: Vec<DnsRecord<'p>>,
    pub authorities: Vec<DnsRecord<'p>>,
    pub additionals: Vec<DnsRecord<'p>>,
}

const TYPE_A: u16 = 1;
const TYPE_NS: u16 = 2;
const TYPE_CNAME: u16 = 5;
const TYPE_SOA: u16 = 6;
const TYPE_PTR: u16 = 12;
const TYPE_HINFO: u16 = 13;
const TYPE_MX: u16 = 15;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;
const TYPE_SRV: u16 = 33;
const TYPE_OPT: u16 = 41;

fn u16_at(msg: &[u8], off: usize) -> Result<u16, DecodeError> {
    msg.get(off..off + 2).map(|b| u16::from_be_bytes([b[0], b[1]])).ok_or(DecodeError::Truncated("dns field past message end"))
}

fn u32_at(msg: &[u8], off: usize) -> Result<u32, DecodeError> {
    msg.get(off..off + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).ok_or(DecodeError::Truncated("dns field past message end"))
}

/// Expand a (possibly compressed) domain name starting at absolute offset
/// `start` within `msg`. Returns the expanded, dot-joined name (arena
/// allocated) and the number of bytes consumed from `start` in the
/// *primary* stream -- i.e. up to and including the terminating zero byte
/// or the 2-byte pointer that redirected elsewhere, never counting bytes
/// read after a pointer jump, since those belong to whatever the pointer
/// target's own position is.
pub(crate) fn parse_name<'p>(arena: &'p Arena, msg: &'p [u8], start: usize) -> Result<(&'p [u8], usize), DecodeError> {
    let mut labels: Vec<u8> = Vec::new();
    let mut pos = start;
    let mut primary_consumed: Option<usize> = None;
    let mut visited: HashSet<usize> = HashSet::new();
    let mut hops = 0usize;

    loop {
        let len_byte = *msg.get(pos).ok_or(DecodeError::Truncated("dns name past message end"))?;
        if len_byte == 0 {
            if primary_consumed.is_none() {
                primary_consumed = Some(pos + 1 - start);
            }
            break;
        } else if len_byte & 0xc0 == 0xc0 {
            let hi = (len_byte & 0x3f) as usize;
            let lo = *msg.get(pos + 1).ok_or(DecodeError::Truncated("dns name pointer truncated"))?;
            let target = (hi << 8) | lo as usize;
            if primary_consumed.is_none() {
                primary_consumed = Some(pos + 2 - start);
            }
            if !visited.insert(target) {
                return Err(DecodeError::Decode("dns name pointer cycle"));
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(DecodeError::Decode("dns name pointer chain too long"));
            }
            if target >= msg.len() {
                return Err(DecodeError::Decode("dns name pointer out of range"));
            }
            pos = target;
        } else if len_byte & 0xc0 != 0 {
            return Err(DecodeError::Decode("dns label length has reserved high bits set"));
        } else {
            let label_len = len_byte as usize;
            if label_len > MAX_LABEL_LEN {
                return Err(DecodeError::Decode("dns label exceeds 63 bytes"));
            }
            let label = msg.get(pos + 1..pos + 1 + label_len).ok_or(DecodeError::Truncated("dns label past message end"))?;
            if label.iter().any(|&b| b < 0x20 || b == 0x7f) {
                return Err(DecodeError::Decode("dns label contains a control byte"));
            }
            if !labels.is_empty() {
                labels.push(b'.');
            }
            labels.extend_from_slice(label);
            if labels.len() >= DNS_NAMELEN {
                return Err(DecodeError::Decode("dns name exceeds 254 bytes"));
            }
            pos += 1 + label_len;
        }
    }

    let consumed = primary_consumed.unwrap_or(pos - start);
    Ok((arena.alloc_copy(&labels), consumed))
}

fn parse_rdata<'p>(arena: &'p Arena, msg: &'p [u8], rtype: u16, rdata_start: usize, rdlength: usize) -> Result<DnsRData<'p>, DecodeError> {
    let raw = msg.get(rdata_start..rdata_start + rdlength).ok_or(DecodeError::Truncated("dns rdata past message end"))?;
    Ok(match rtype {
        TYPE_A if raw.len() == 4 => {
            let mut a = [0u8; 4];
            a.copy_from_slice(raw);
            DnsRData::A(a)
        }
        TYPE_AAAA if raw.len() == 16 => {
            let mut a = [0u8; 16];
            a.copy_from_slice(raw);
            DnsRData::Aaaa(a)
        }
        TYPE_NS => DnsRData::Ns(parse_name(arena, msg, rdata_start)?.0),
        TYPE_CNAME => DnsRData::Cname(parse_name(arena, msg, rdata_start)?.0),
        TYPE_PTR => DnsRData::Ptr(parse_name(arena, msg, rdata_start)?.0),
        TYPE_SOA => {
            let (mname, n1) = parse_name(arena, msg, rdata_start)?;
            let (rname, n2) = parse_name(arena, msg, rdata_start + n1)?;
            let nums_off = rdata_start + n1 + n2;
            DnsRData::Soa {
                mname,
                rname,
                serial: u32_at(msg, nums_off)?,
                refresh: u32_at(msg, nums_off + 4)?,
                retry: u32_at(msg, nums_off + 8)?,
                expire: u32_at(msg, nums_off + 12)?,
                minimum: u32_at(msg, nums_off + 16)?,
            }
        }
        TYPE_HINFO => {
            let cpu_len = *raw.first().ok_or(DecodeError::Decode("truncated HINFO"))? as usize;
            let cpu = raw.get(1..1 + cpu_len).ok_or(DecodeError::Decode("truncated HINFO cpu"))?;
            let os_len_off = 1 + cpu_len;
            let os_len = *raw.get(os_len_off).ok_or(DecodeError::Decode("truncated HINFO"))? as usize;
            let os = raw.get(os_len_off + 1..os_len_off + 1 + os_len).ok_or(DecodeError::Decode("truncated HINFO os"))?;
            DnsRData::Hinfo { cpu: arena.alloc_copy(cpu), os: arena.alloc_copy(os) }
        }
        TYPE_TXT => {
            let mut strings = Vec::new();
            let mut i = 0;
            while i < raw.len() {
                let len = raw[i] as usize;
                let s = raw.get(i + 1..i + 1 + len).ok_or(DecodeError::Decode("truncated TXT character-string"))?;
                strings.push(arena.alloc_copy(s));
                i += 1 + len;
            }
            DnsRData::Txt(strings)
        }
        TYPE_MX => {
            let preference = u16_at(msg, rdata_start)?;
            let (exchange, _) = parse_name(arena, msg, rdata_start + 2)?;
            DnsRData::Mx { preference, exchange }
        }
        TYPE_SRV => {
            let priority = u16_at(msg, rdata_start)?;
            let weight = u16_at(msg, rdata_start + 2)?;
            let port = u16_at(msg, rdata_start + 4)?;
            let (target, _) = parse_name(arena, msg, rdata_start + 6)?;
            DnsRData::Srv { priority, weight, port, target }
        }
        TYPE_OPT => DnsRData::Opt(arena.alloc_copy(raw)),
        _ => DnsRData::Other(arena.alloc_copy(raw)),
    })
}

fn parse_question<'p>(arena: &'p Arena, msg: &'p [u8], reader: &mut Reader<'p>) -> Result<DnsQuestion<'p>, DecodeError> {
    let (name, consumed) = parse_name(arena, msg, reader.pos())?;
    reader.skip(consumed)?;
    let qtype = reader.u16_be()?;
    let qclass = reader.u16_be()?;
    Ok(DnsQuestion { name, qtype, qclass })
}

fn parse_record<'p>(arena: &'p Arena, msg: &'p [u8], reader: &mut Reader<'p>) -> Result<DnsRecord<'p>, DecodeError> {
    let (name, consumed) = parse_name(arena, msg, reader.pos())?;
    reader.skip(consumed)?;
    let rtype = reader.u16_be()?;
    let rclass = reader.u16_be()?;
    let ttl = reader.u32_be()?;
    let rdlength = reader.u16_be()? as usize;
    let rdata_start = reader.pos();
    reader.skip(rdlength)?;
    let rdata = parse_rdata(arena, msg, rtype, rdata_start, rdlength)?;
    Ok(DnsRecord { name, rtype, rclass, ttl, rdata })
}

pub struct DnsHandler {
    counters: Counters,
}

impl DnsHandler {
    pub fn new() -> Self {
        DnsHandler { counters: Counters::default() }
    }
}

impl Handler for DnsHandler {
    fn short_name(&self) -> &'static str {
        "dns"
    }
    fn long_name(&self) -> &'static str {
        "Domain Name System"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let msg = reader.as_slice();
        if msg.len() < HEADER_LEN {
            return Err(DecodeError::Truncated("dns header shorter than 12 bytes"));
        }
        let id = reader.u16_be()?;
        let flags = reader.u16_be()?;
        let qr = flags & 0x8000 != 0;
        let opcode = ((flags >> 11) & 0x0f) as u8;
        let aa = flags & 0x0400 != 0;
        let tc = flags & 0x0200 != 0;
        let rd = flags & 0x0100 != 0;
        let ra = flags & 0x0080 != 0;
        let rcode = (flags & 0x000f) as u8;
        let qdcount = reader.u16_be()?;
        let ancount = reader.u16_be()?;
        let nscount = reader.u16_be()?;
        let arcount = reader.u16_be()?;

        if !qr && arcount > 2 {
            return Err(DecodeError::Decode("dns query with more than 2 additional records"));
        }
        let total_records = ancount as usize + nscount as usize + arcount as usize;
        if total_records > msg.len() {
            return Err(DecodeError::Decode("dns record count exceeds message size"));
        }

        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            questions.push(parse_question(arena, msg, &mut reader)?);
        }
        let mut answers = Vec::with_capacity(ancount as usize);
        for _ in 0..ancount {
            answers.push(parse_record(arena, msg, &mut reader)?);
        }
        let mut authorities = Vec::with_capacity(nscount as usize);
        for _ in 0..nscount {
            authorities.push(parse_record(arena, msg, &mut reader)?);
        }
        let mut additionals = Vec::with_capacity(arcount as usize);
        for _ in 0..arcount {
            additionals.push(parse_record(arena, msg, &mut reader)?);
        }

        self.counters.record(msg.len());
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::DNS,
            id: registry.id_of(Layer::Port, port::DNS).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: HEADER_LEN,
            data: ProtocolData::Dns(DnsMessage { id, qr, opcode, aa, tc, rd, ra, rcode, questions, answers, authorities, additionals }),
            next: None,
        });
        Ok(HandlerSuccess { pdu, status: PacketStatus::NoErr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Vec<u8> {
        let mut v = vec![s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn s6_pointer_cycle_is_rejected_not_infinite_looped() {
        // Byte 0 is a pointer label pointing to offset 0 (itself).
        let msg: Vec<u8> = vec![0xc0, 0x00];
        let arena = Arena::new();
        let result = parse_name(&arena, &msg, 0);
        assert!(result.is_err());
    }

    #[test]
    fn plain_name_round_trips() {
        let mut msg = label("example");
        msg.extend(label("com"));
        msg.push(0);
        let arena = Arena::new();
        let (name, consumed) = parse_name(&arena, &msg, 0).unwrap();
        assert_eq!(name, b"example.com");
        assert_eq!(consumed, msg.len());
    }

    #[test]
    fn compressed_name_follows_pointer() {
        let mut msg = label("example");
        msg.extend(label("com"));
        msg.push(0);
        let base = msg.len();
        msg.extend(label("www"));
        msg.push(0xc0);
        msg.push(0x00); // pointer back to offset 0 ("example.com")
        let arena = Arena::new();
        let (name, consumed) = parse_name(&arena, &msg, base).unwrap();
        assert_eq!(name, b"www.example.com");
        assert_eq!(consumed, msg.len() - base);
    }

    #[test]
    fn s4_dns_a_response_single_answer() {
        let mut registry = Registry::new();
        crate::proto::register_all(&mut registry);
        let arena = Arena::new();

        let mut msg = Vec::new();
        msg.extend_from_slice(&1234u16.to_be_bytes()); // id
        msg.extend_from_slice(&0x8180u16.to_be_bytes()); // qr+rd+ra
        msg.extend_from_slice(&1u16.to_be_bytes()); // qdcount
        msg.extend_from_slice(&1u16.to_be_bytes()); // ancount
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&0u16.to_be_bytes());
        let qname_offset = msg.len();
        msg.extend(label("example"));
        msg.extend(label("com"));
        msg.push(0);
        msg.extend_from_slice(&1u16.to_be_bytes()); // qtype A
        msg.extend_from_slice(&1u16.to_be_bytes()); // qclass IN
        msg.push(0xc0);
        msg.push(qname_offset as u8); // name = pointer to question name
        msg.extend_from_slice(&1u16.to_be_bytes()); // type A
        msg.extend_from_slice(&1u16.to_be_bytes()); // class IN
        msg.extend_from_slice(&3600u32.to_be_bytes()); // ttl
        msg.extend_from_slice(&4u16.to_be_bytes()); // rdlength
        msg.extend_from_slice(&[93, 184, 216, 34]);

        let handler = DnsHandler::new();
        let reader = Reader::new(&msg);
        let success = handler.decode(&registry, &arena, 0, reader).expect("valid dns message decodes");
        match &success.pdu.data {
            ProtocolData::Dns(m) => {
                assert_eq!(m.answers.len(), 1);
                match &m.answers[0].rdata {
                    DnsRData::A(addr) => assert_eq!(*addr, [93, 184, 216, 34]),
                    _ => panic!("expected A record"),
                }
            }
            _ => panic!("expected dns pdu"),
        }
    }
}
