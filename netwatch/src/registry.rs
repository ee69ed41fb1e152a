//! Maps `(layer, key)` to a protocol handler. Built once at session start,
//! read-only (with respect to its own structure) thereafter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::arena::Arena;
use crate::error::DecodeError;
use crate::layer::Layer;
use crate::pdu::Pdu;
use crate::reader::Reader;

/// Per-protocol packet/byte counters. Updated from `&self` (the registry is
/// read-only after init, so lookups never need `&mut`), hence atomics
/// rather than a plain integer.
#[derive(Default)]
pub struct Counters {
    pub num_packets: AtomicU64,
    pub num_bytes: AtomicU64,
}

impl Counters {
    pub fn record(&self, bytes: usize) {
        self.num_packets.fetch_add(1, Ordering::Relaxed);
        self.num_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (self.num_packets.load(Ordering::Relaxed), self.num_bytes.load(Ordering::Relaxed))
    }
}

/// Successful decode of one layer: the PDU it built for itself, plus the
/// terminal status contributed by whatever happened further down the
/// chain (`NoErr` if there was nothing left to decode, `UnkProtocol` if a
/// deeper key had no registered handler, or `DecodeErr` if a deeper layer's
/// header failed validation).
pub struct HandlerSuccess<'p> {
    pub pdu: &'p Pdu<'p>,
    pub status: crate::error::PacketStatus,
}

pub type HandlerResult<'p> = Result<HandlerSuccess<'p>, DecodeError>;

/// A single registered protocol decoder.
pub trait Handler: Send + Sync {
    fn short_name(&self) -> &'static str;
    fn long_name(&self) -> &'static str;
    fn counters(&self) -> &Counters;

    /// Parse this layer's header out of `reader`, recurse into whatever
    /// inner layer it believes follows (via [`crate::decode::decode_next`]),
    /// and build this layer's [`Pdu`] in `arena`. `depth` is this handler's
    /// own depth in the chain (the entry link-layer handler is called at
    /// depth 0); handlers must pass `depth` through unchanged to
    /// `decode_next` for their own recursive call, which increments it.
    fn decode<'p>(&self, registry: &Registry, arena: &'p Arena, depth: u32, reader: Reader<'p>) -> HandlerResult<'p>;
}

struct Registered {
    handler: Box<dyn Handler>,
    short_name: &'static str,
    long_name: &'static str,
    id: u32,
}

/// The `(layer, key) -> handler` table.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<(Layer, u32), Registered>,
    next_id: u32,
}

impl Registry {
    pub fn new() -> Self {
        Registry { handlers: HashMap::new(), next_id: 0 }
    }

    /// Register `handler` under `(layer, key)`. Idempotent on duplicate
    /// registration: the later call wins, and a `warn!` is logged so a
    /// silently-shadowed handler does not go unnoticed.
    pub fn register(&mut self, layer: Layer, key: u32, short_name: &'static str, long_name: &'static str, handler: Box<dyn Handler>) {
        let id = self.next_id;
        self.next_id += 1;
        if let Some(prev) = self.handlers.insert((layer, key), Registered { handler, short_name, long_name, id }) {
            tracing::warn!(
                layer = ?layer, key, previous = prev.short_name, replacement = short_name,
                "protocol registration overwritten"
            );
        } else {
            tracing::debug!(layer = ?layer, key, short_name, "registered protocol handler");
        }
    }

    pub fn get(&self, layer: Layer, key: u32) -> Option<(&dyn Handler, u32, &'static str)> {
        self.handlers.get(&(layer, key)).map(|r| (r.handler.as_ref(), r.id, r.short_name))
    }

    pub fn id_of(&self, layer: Layer, key: u32) -> Option<u32> {
        self.handlers.get(&(layer, key)).map(|r| r.id)
    }

    /// Enumerate every registration, for diagnostics and for tests that
    /// assert the full wiring (matching `register.h`) is present.
    pub fn enumerate(&self) -> impl Iterator<Item = (Layer, u32, &'static str, &'static str, &Counters)> {
        self.handlers.iter().map(|(&(layer, key), r)| (layer, key, r.short_name, r.long_name, r.handler.counters()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
