//! TCP flow analyzer (§4.7): a connection table keyed by a direction-
//! symmetric 4-tuple, advanced by a full RFC 793 transition table.
//!
//! The table itself is grounded on the registry's `HashMap<key, T>`
//! pattern (`registry.rs`); the symmetric-key / "two packets, one
//! connection" idea is grounded on the teacher's `tcp::endpoint` slot
//! table, which canonicalizes the same way before indexing a single slot
//! for both directions of a stream.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::proto::tcp::TcpFlags;
use crate::pubsub::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

/// A 4-tuple key canonicalized so that either direction of a stream maps
/// to the same key (invariant: "connection key invariant under src/dst
/// swap").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    low: Endpoint,
    high: Endpoint,
}

impl ConnectionId {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        if a <= b {
            ConnectionId { low: a, high: b }
        } else {
            ConnectionId { low: b, high: a }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
    Reset,
}

pub struct Connection {
    pub id: ConnectionId,
    pub state: TcpState,
    /// Which endpoint originated the connection (sent the initial SYN) --
    /// needed to tell a FIN sent by "the local side" from one sent by the
    /// remote side when deciding between `FIN_WAIT_1` and `CLOSE_WAIT`.
    pub initiator: Endpoint,
    pub packet_count: u64,
}

#[derive(Default)]
pub struct FlowAnalyzer {
    connections: HashMap<ConnectionId, Connection>,
    pub new_connection: Topic<ConnectionId>,
    pub connection_updated: Topic<ConnectionId>,
}

impl FlowAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one TCP segment. `src`/`dst` are this packet's direction;
    /// `flags` are its TCP flags. Returns the connection id and whether
    /// this packet created a new entry.
    pub fn track(&mut self, src: Endpoint, dst: Endpoint, flags: TcpFlags) -> (ConnectionId, bool) {
        let id = ConnectionId::new(src, dst);
        let is_new = !self.connections.contains_key(&id);

        if is_new {
            let state = if flags.is_syn_only() { TcpState::SynSent } else { TcpState::Closed };
            self.connections.insert(
                id,
                Connection { id, state, initiator: src, packet_count: 0 },
            );
            self.new_connection.publish(&id);
        }

        let conn = self.connections.get_mut(&id).expect("just inserted or already present");
        conn.packet_count += 1;
        let from_initiator = src == conn.initiator;
        let next = next_state(conn.state, flags, from_initiator);
        let changed = next != conn.state;
        conn.state = next;

        if changed {
            self.connection_updated.publish(&id);
        }

        if conn.state == TcpState::Closed && !is_new {
            // LAST_ACK + ACK -> CLOSED drops the connection from the live
            // table; its packets remain accounted for via packet_count
            // already folded into whatever summary the caller keeps.
            self.connections.remove(&id);
        }

        (id, is_new)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn free_all(&mut self) {
        self.connections.clear();
    }
}

/// RFC 793 transitions plus the §4.7 "ADDED" edges. A transition not
/// covered here leaves the state unchanged: no retransmit/timeout
/// inference, and no silent corruption on an out-of-order or duplicate
/// segment.
fn next_state(state: TcpState, flags: TcpFlags, from_initiator: bool) -> TcpState {
    if flags.rst {
        return TcpState::Reset;
    }

    use TcpState::*;

    // A FIN almost always rides on a packet that also has ACK set (it
    // acknowledges whatever came before), so FIN/ACK transitions key off
    // FIN alone; a pure ACK (no SYN, no FIN) is handled separately below.
    if flags.syn && !flags.fin {
        return match state {
            Closed | Listen => {
                if from_initiator {
                    SynSent
                } else {
                    SynRcvd
                }
            }
            SynSent if flags.ack => Established,
            _ => state,
        };
    }

    if flags.fin {
        return match state {
            Established => {
                if from_initiator {
                    FinWait1
                } else {
                    CloseWait
                }
            }
            // the other side's FIN arrived before it acked ours: simultaneous close.
            FinWait1 => Closing,
            FinWait2 => TimeWait,
            CloseWait => LastAck,
            _ => state,
        };
    }

    if flags.ack {
        return match state {
            SynRcvd => Established,
            FinWait1 => FinWait2,
            Closing => TimeWait,
            LastAck => Closed,
            _ => state,
        };
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ep(ip: [u8; 4], port: u16) -> Endpoint {
        Endpoint { addr: IpAddr::V4(Ipv4Addr::from(ip)), port }
    }

    fn syn() -> TcpFlags {
        TcpFlags { syn: true, ..Default::default() }
    }
    fn syn_ack() -> TcpFlags {
        TcpFlags { syn: true, ack: true, ..Default::default() }
    }
    fn ack() -> TcpFlags {
        TcpFlags { ack: true, ..Default::default() }
    }
    fn fin_ack() -> TcpFlags {
        TcpFlags { fin: true, ack: true, ..Default::default() }
    }

    #[test]
    fn connection_key_is_invariant_under_src_dst_swap() {
        let a = ep([10, 0, 0, 1], 54321);
        let b = ep([8, 8, 8, 8], 443);
        assert_eq!(ConnectionId::new(a, b), ConnectionId::new(b, a));
    }

    #[test]
    fn s3_three_way_handshake_both_directions_share_one_connection() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 54321);
        let server = ep([8, 8, 8, 8], 443);

        let (id1, new1) = flow.track(client, server, syn());
        assert!(new1);
        assert_eq!(flow.get(id1).unwrap().state, TcpState::SynSent);

        let (id2, new2) = flow.track(server, client, syn_ack());
        assert!(!new2);
        assert_eq!(id1, id2);
        assert_eq!(flow.get(id2).unwrap().state, TcpState::Established);

        let (id3, new3) = flow.track(client, server, ack());
        assert!(!new3);
        assert_eq!(id1, id3);
        assert_eq!(flow.get(id3).unwrap().state, TcpState::Established);
    }

    #[test]
    fn full_graceful_close_reaches_closed_and_is_dropped() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 54321);
        let server = ep([8, 8, 8, 8], 443);

        flow.track(client, server, syn());
        flow.track(server, client, syn_ack());
        flow.track(client, server, ack());

        let (id, _) = flow.track(client, server, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::FinWait1);

        flow.track(server, client, ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::FinWait2);

        flow.track(server, client, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::TimeWait);
    }

    #[test]
    fn passive_close_reaches_last_ack_then_closed_and_drops_from_table() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 54321);
        let server = ep([8, 8, 8, 8], 443);

        flow.track(client, server, syn());
        flow.track(server, client, syn_ack());
        flow.track(client, server, ack());

        // server (the non-initiator) closes first.
        let (id, _) = flow.track(server, client, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::CloseWait);

        flow.track(client, server, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::LastAck);

        flow.track(server, client, ack());
        assert!(flow.get(id).is_none(), "CLOSED connections drop out of the live table");
    }

    #[test]
    fn simultaneous_close_reaches_closing_then_time_wait() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 54321);
        let server = ep([8, 8, 8, 8], 443);

        flow.track(client, server, syn());
        flow.track(server, client, syn_ack());
        flow.track(client, server, ack());

        let (id, _) = flow.track(client, server, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::FinWait1);

        // server also sends FIN before acking the client's -- simultaneous close.
        flow.track(server, client, fin_ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::Closing);

        flow.track(server, client, ack());
        assert_eq!(flow.get(id).unwrap().state, TcpState::TimeWait);
    }

    #[test]
    fn rst_moves_to_reset_from_any_state() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 1234);
        let server = ep([8, 8, 8, 8], 80);
        flow.track(client, server, syn());
        let (id, _) = flow.track(server, client, TcpFlags { rst: true, ..Default::default() });
        assert_eq!(flow.get(id).unwrap().state, TcpState::Reset);
    }

    #[test]
    fn unmatched_transition_leaves_state_unchanged() {
        let mut flow = FlowAnalyzer::new();
        let client = ep([10, 0, 0, 1], 1234);
        let server = ep([8, 8, 8, 8], 80);
        let (id, _) = flow.track(client, server, syn());
        // A duplicate SYN while already in SYN_SENT isn't in the table;
        // state must hold rather than silently resetting.
        flow.track(client, server, syn());
        assert_eq!(flow.get(id).unwrap().state, TcpState::SynSent);
    }
}
