//! Drives the registry to build a PDU chain out of one captured frame.

use crate::arena::Arena;
use crate::error::PacketStatus;
use crate::layer::{Layer, LINK_ETHERNET};
use crate::pdu::{Packet, Pdu, MAX_DEPTH};
use crate::proto::ProtocolData;
use crate::reader::Reader;
use crate::registry::Registry;

/// Look up `(layer, key)` in the registry and, if found, hand `reader` to
/// its handler. This is the single recursion point every protocol handler
/// calls into for its own "next layer"; centralizing it here is what
/// enforces the depth bound and the `UnkProtocol` contract uniformly
/// instead of duplicating that bookkeeping in every handler.
pub fn decode_next<'p>(
    registry: &Registry,
    arena: &'p Arena,
    depth: u32,
    layer: Layer,
    key: u32,
    reader: Reader<'p>,
) -> (Option<&'p Pdu<'p>>, PacketStatus) {
    if depth >= MAX_DEPTH {
        return (None, PacketStatus::DecodeErr("pdu chain depth exceeded"));
    }
    match registry.get(layer, key) {
        None => (None, PacketStatus::UnkProtocol),
        Some((handler, _id, _name)) => match handler.decode(registry, arena, depth + 1, reader) {
            Ok(success) => (Some(success.pdu), success.status),
            Err(e) => (None, e.into()),
        },
    }
}

/// Decode one captured frame into a [`Packet`]. `seq` is the caller-assigned
/// monotonic sequence number (see [`crate::session::Session::next_seq`]).
pub fn decode<'p>(
    registry: &Registry,
    arena: &'p Arena,
    seq: u64,
    ts_sec: u32,
    ts_usec: u32,
    orig_len: usize,
    frame: &'p [u8],
) -> Packet<'p> {
    let reader = Reader::new(frame);
    let (root, status) = decode_next(registry, arena, 0, Layer::Link, LINK_ETHERNET, reader);

    let root = root.unwrap_or_else(|| {
        // Even a frame the link-layer handler refuses to touch (or whose
        // registration is missing) still produces a packet: a raw,
        // unparsed root PDU, so the invariant "a root PDU always exists"
        // holds unconditionally.
        arena.alloc(Pdu {
            layer: Layer::Link,
            key: LINK_ETHERNET,
            id: u32::MAX,
            short_name: "raw",
            header_len: 0,
            data: ProtocolData::Raw(frame),
            next: None,
        })
    });

    Packet { seq, ts_sec, ts_usec, orig_len, captured_len: frame.len(), root, status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn unregistered_link_layer_still_produces_a_root_pdu() {
        let arena = Arena::new();
        let registry = Registry::new();
        let pkt = decode(&registry, &arena, 0, 0, 0, 4, &[1, 2, 3, 4]);
        assert_eq!(pkt.status, PacketStatus::UnkProtocol);
        assert!(matches!(pkt.root.data, ProtocolData::Raw(_)));
    }
}
