//! TCP: fixed header, option TLV walk, and the "try both ports" dispatch
//! to the application layer.

use crate::arena::Arena;
use crate::decode::decode_next;
use crate::error::DecodeError;
use crate::layer::{ip_proto, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpFlags {
    pub ns: bool,
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl TcpFlags {
    pub fn is_syn_only(&self) -> bool {
        self.syn && !self.ack && !self.rst && !self.fin
    }
    pub fn is_syn_ack(&self) -> bool {
        self.syn && self.ack
    }
}

const OPT_END: u8 = 0;
const OPT_NOP: u8 = 1;
const OPT_MSS: u8 = 2;
const OPT_WINDOW_SCALE: u8 = 3;
const OPT_SACK_PERMITTED: u8 = 4;
const OPT_SACK: u8 = 5;
const OPT_TIMESTAMP: u8 = 8;
const OPT_TFO: u8 = 34;

#[derive(Debug, Clone, Copy)]
pub enum TcpOption<'p> {
    Nop,
    Mss(u16),
    WindowScale(u8),
    SackPermitted,
    Sack(&'p [u8]),
    Timestamp { value: u32, echo_reply: u32 },
    FastOpen(&'p [u8]),
    Other { kind: u8, data: &'p [u8] },
}

pub struct TcpHeader<'p> {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
    pub options: Vec<TcpOption<'p>>,
}

/// Walk TCP options out of `reader`, which must be bounded to exactly the
/// option bytes (`(data_offset - 5) * 4`).
///
/// Grounding bug: the option walk this is based on breaks out of the loop
/// on any non-NOP option whose length field is zero, to avoid looping
/// forever re-reading the same byte. We keep that guard (a non-NOP option
/// must declare at least the 2 bytes of its own kind+length) but treat it
/// as "stop parsing further options", not a decode error: the header
/// itself is still well-formed up to that point.
fn parse_options<'p>(reader: &mut Reader<'p>) -> Vec<TcpOption<'p>> {
    let mut options = Vec::new();
    loop {
        let kind = match reader.u8() {
            Ok(k) => k,
            Err(_) => break,
        };
        if kind == OPT_END {
            break;
        }
        if kind == OPT_NOP {
            options.push(TcpOption::Nop);
            continue;
        }
        let length = match reader.u8() {
            Ok(l) => l,
            Err(_) => break,
        };
        if length < 2 {
            // Malformed length (would consume zero or negative payload
            // bytes, looping forever on the same position). Stop here.
            break;
        }
        let payload_len = (length - 2) as usize;
        let data = match reader.bytes(payload_len) {
            Ok(d) => d,
            Err(_) => break,
        };
        let opt = match kind {
            OPT_MSS if data.len() == 2 => TcpOption::Mss(u16::from_be_bytes([data[0], data[1]])),
            OPT_WINDOW_SCALE if data.len() == 1 => TcpOption::WindowScale(data[0]),
            OPT_SACK_PERMITTED => TcpOption::SackPermitted,
            OPT_SACK => TcpOption::Sack(data),
            OPT_TIMESTAMP if data.len() == 8 => TcpOption::Timestamp {
                value: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                echo_reply: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            },
            OPT_TFO => TcpOption::FastOpen(data),
            other => TcpOption::Other { kind: other, data },
        };
        options.push(opt);
    }
    options
}

pub struct TcpHandler {
    counters: Counters,
}

impl TcpHandler {
    pub fn new() -> Self {
        TcpHandler { counters: Counters::default() }
    }
}

impl Handler for TcpHandler {
    fn short_name(&self) -> &'static str {
        "tcp"
    }
    fn long_name(&self) -> &'static str {
        "Transmission Control Protocol"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let src_port = reader.u16_be()?;
        let dst_port = reader.u16_be()?;
        let seq = reader.u32_be()?;
        let ack = reader.u32_be()?;
        let offset_reserved_flags = reader.u16_be()?;
        let data_offset = (offset_reserved_flags >> 12) as u8;
        if data_offset < 5 {
            return Err(DecodeError::Decode("TCP data offset < 5"));
        }
        let flag_bits = offset_reserved_flags & 0x01ff;
        let flags = TcpFlags {
            ns: flag_bits & 0x100 != 0,
            cwr: flag_bits & 0x080 != 0,
            ece: flag_bits & 0x040 != 0,
            urg: flag_bits & 0x020 != 0,
            ack: flag_bits & 0x010 != 0,
            psh: flag_bits & 0x008 != 0,
            rst: flag_bits & 0x004 != 0,
            syn: flag_bits & 0x002 != 0,
            fin: flag_bits & 0x001 != 0,
        };
        let window = reader.u16_be()?;
        let checksum = reader.u16_be()?;
        let urgent_ptr = reader.u16_be()?;

        let header_len = data_offset as usize * 4;
        if header_len > 20 + reader.remaining() {
            return Err(DecodeError::Truncated("TCP header longer than captured data"));
        }
        let options_len = header_len - 20;
        let mut options_reader = reader.sub_reader(options_len)?;
        let options = parse_options(&mut options_reader);

        self.counters.record(header_len + reader.remaining());

        // Both directions are tried because either endpoint may be the
        // server; the first registered port wins.
        let (next, status) = {
            let first = decode_next(registry, arena, depth, Layer::Port, src_port as u32, reader);
            if first.0.is_some() {
                first
            } else {
                decode_next(registry, arena, depth, Layer::Port, dst_port as u32, reader)
            }
        };

        let pdu = arena.alloc(Pdu {
            layer: Layer::IpProto,
            key: ip_proto::TCP,
            id: registry.id_of(Layer::IpProto, ip_proto::TCP).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len,
            data: ProtocolData::Tcp(TcpHeader { src_port, dst_port, seq, ack, data_offset, flags, window, checksum, urgent_ptr, options }),
            next,
        });
        Ok(HandlerSuccess { pdu, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_non_nop_option_stops_without_looping() {
        // kind=5 (SACK), length=0 -- the infinite-loop guard must stop
        // parsing instead of re-reading the same two bytes forever.
        let bytes = [5u8, 0, 5, 0, 1, 1];
        let mut r = Reader::new(&bytes);
        let opts = parse_options(&mut r);
        assert!(opts.is_empty());
    }

    #[test]
    fn nop_padding_is_preserved() {
        let bytes = [1u8, 1, 1, 0];
        let mut r = Reader::new(&bytes);
        let opts = parse_options(&mut r);
        assert_eq!(opts.len(), 3);
    }
}
