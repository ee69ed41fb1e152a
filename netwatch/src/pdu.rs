//! The decoded PDU chain and the packet that owns its root.

use crate::layer::Layer;
use crate::proto;

/// Depth bound on the PDU chain (invariant 1: "decode(f) terminates and
/// returns a packet whose PDU chain depth ≤ 16").
pub const MAX_DEPTH: u32 = 16;

/// One layer's worth of decoded header, arena-owned, linking to the next
/// inner PDU if there is one. The chain is acyclic and finite by
/// construction: `next` is only ever set to a freshly allocated PDU at
/// strictly increasing depth, never to an ancestor.
pub struct Pdu<'p> {
    pub layer: Layer,
    pub key: u32,
    /// Compact id assigned by the registry at registration time, usable for
    /// `get_packet_data(root, id)`-style lookups without string compares.
    pub id: u32,
    pub short_name: &'static str,
    /// Number of bytes of the frame this layer's header (not its payload)
    /// covers.
    pub header_len: usize,
    pub data: proto::ProtocolData<'p>,
    pub next: Option<&'p Pdu<'p>>,
}

impl<'p> Pdu<'p> {
    /// Walk the chain looking for the first PDU whose registry id matches.
    /// Mirrors the grounding source's `get_packet_data(p, id)` helper used
    /// by every protocol's accessor functions.
    pub fn find(&self, id: u32) -> Option<&Pdu<'p>> {
        let mut cur = Some(self);
        while let Some(pdu) = cur {
            if pdu.id == id {
                return Some(pdu);
            }
            cur = pdu.next;
        }
        None
    }

    /// Walk the chain looking for the first PDU of the matching protocol
    /// data variant discriminant, via a predicate over `&ProtocolData`.
    pub fn find_by(&self, pred: impl Fn(&proto::ProtocolData<'p>) -> bool) -> Option<&Pdu<'p>> {
        let mut cur = Some(self);
        while let Some(pdu) = cur {
            if pred(&pdu.data) {
                return Some(pdu);
            }
            cur = pdu.next;
        }
        None
    }

    pub fn depth(&self) -> u32 {
        let mut n = 0;
        let mut cur = self.next;
        while let Some(pdu) = cur {
            n += 1;
            cur = pdu.next;
        }
        n
    }
}

use crate::error::PacketStatus;

/// A captured frame, fully decoded.
pub struct Packet<'p> {
    pub seq: u64,
    pub ts_sec: u32,
    pub ts_usec: u32,
    /// Original (on-the-wire) length, which may exceed `captured_len` if
    /// the capture snapshot length truncated the frame.
    pub orig_len: usize,
    pub captured_len: usize,
    pub root: &'p Pdu<'p>,
    pub status: PacketStatus,
}

impl<'p> Packet<'p> {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, PacketStatus::NoErr)
    }
}
