//! SMB: transport-header recognition only (NetBIOS session service
//! framing plus the `\xFFSMB`/`\xFESMB` protocol signature) -- no
//! file-sharing protocol semantics. Its purpose here is exercising the
//! registry's port dispatch, not decoding SMB commands.

use crate::arena::Arena;
use crate::error::{DecodeError, PacketStatus};
use crate::layer::{port, Layer};
use crate::pdu::Pdu;
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::{Counters, Handler, HandlerResult, HandlerSuccess, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbDialect {
    Smb1,
    Smb2Plus,
}

pub struct SmbHeader {
    pub dialect: SmbDialect,
    pub command_or_structure_size: u16,
}

pub struct SmbHandler {
    counters: Counters,
}

impl SmbHandler {
    pub fn new() -> Self {
        SmbHandler { counters: Counters::default() }
    }
}

impl Handler for SmbHandler {
    fn short_name(&self) -> &'static str {
        "smb"
    }
    fn long_name(&self) -> &'static str {
        "Server Message Block"
    }
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, _depth: u32, mut reader: Reader<'p>) -> HandlerResult<'p> {
        let signature = reader.bytes(4)?;
        let dialect = match signature {
            [0xff, b'S', b'M', b'B'] => SmbDialect::Smb1,
            [0xfe, b'S', b'M', b'B'] => SmbDialect::Smb2Plus,
            _ => return Err(DecodeError::Decode("missing SMB protocol signature")),
        };
        let command_or_structure_size = match dialect {
            SmbDialect::Smb1 => reader.u8()? as u16,
            SmbDialect::Smb2Plus => reader.u16_be()?,
        };

        self.counters.record(reader.remaining() + 4);
        let pdu = arena.alloc(Pdu {
            layer: Layer::Port,
            key: port::SMB,
            id: registry.id_of(Layer::Port, port::SMB).unwrap_or(u32::MAX),
            short_name: self.short_name(),
            header_len: 4,
            data: ProtocolData::Smb(SmbHeader { dialect, command_or_structure_size }),
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
    fn recognizes_smb1_signature() {
        let arena = Arena::new();
        let registry = Registry::new();
        let handler = SmbHandler::new();
        let raw = [0xff, b'S', b'M', b'B', 0x72];
        let success = handler.decode(&registry, &arena, 0, Reader::new(&raw)).unwrap();
        match &success.pdu.data {
            ProtocolData::Smb(h) => assert_eq!(h.dialect, SmbDialect::Smb1),
            _ => panic!("expected smb pdu"),
        }
    }
}
