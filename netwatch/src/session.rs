//! Capture session: the composition root that owns the long-lived arena,
//! the protocol registry, and the three analyzers, and wires a decoded
//! packet through all three (§2, §9: "a single capture session owns these
//! as a unit").

use std::net::Ipv4Addr;

use crate::arena::Arena;
use crate::dns_cache::DnsCache;
use crate::flow::{Endpoint, FlowAnalyzer};
use crate::host::HostAnalyzer;
use crate::pdu::Packet;
use crate::proto::{self, ProtocolData};
use crate::registry::Registry;

pub struct Session {
    /// Long-lived: packets, PDUs, and every analyzer record live here for
    /// the whole session.
    pub arena: Arena,
    pub registry: Registry,
    pub flow: FlowAnalyzer,
    pub hosts: HostAnalyzer,
    pub dns_cache: DnsCache,
    next_seq: u64,
}

impl Session {
    pub fn new() -> Self {
        let mut registry = Registry::new();
        proto::register_all(&mut registry);
        Session {
            arena: Arena::new(),
            registry,
            flow: FlowAnalyzer::new(),
            hosts: HostAnalyzer::new(),
            dns_cache: DnsCache::new(),
            next_seq: 0,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Decode one captured frame and feed the result through the DNS
    /// cache, host analyzer, and flow analyzer, in that order. A resolved
    /// A record is pushed into the host analyzer immediately, so a host
    /// already on record gets its name attached on this very packet,
    /// matching §4.8's "on a DNS cache update for an already-present
    /// address, attach the name and publish a name-resolved event"; a
    /// host first observed by a *later* packet picks its name up from
    /// the cache directly, in `feed_host_analyzer` below.
    ///
    /// Each `feed_*` step below takes explicit disjoint field references
    /// rather than `&mut self` -- the returned [`Packet`] borrows from
    /// `self.arena`, and the borrow checker can only see that borrow as
    /// independent of `self.flow`/`self.hosts`/`self.dns_cache` if the
    /// split happens through direct field projections in this function,
    /// not through a method call that re-takes the whole `&mut self`.
    pub fn ingest<'p>(&'p mut self, ts_sec: u32, ts_usec: u32, orig_len: usize, frame: &'p [u8]) -> Packet<'p> {
        let seq = self.next_seq();
        let packet = crate::decode::decode(&self.registry, &self.arena, seq, ts_sec, ts_usec, orig_len, frame);

        feed_dns_cache(&mut self.dns_cache, &mut self.hosts, &packet);
        feed_host_analyzer(&mut self.hosts, &self.dns_cache, &packet);
        feed_flow_analyzer(&mut self.flow, &packet);

        packet
    }
}

/// Insert every A record from an answered DNS message into the cache, and
/// -- mirroring the grounding's `dns_cache_subscribe(update_host)` wiring
/// in its analyzer constructor -- immediately hand each resolved name to
/// the host analyzer, so an already-known host gets its name attached and
/// `host_name_resolved` fires on this very packet (§4.8), not just on a
/// host observed after the resolution.
fn feed_dns_cache(dns_cache: &mut DnsCache, hosts: &mut HostAnalyzer, packet: &Packet<'_>) {
    let Some(dns_pdu) = packet.root.find_by(|d| matches!(d, ProtocolData::Dns(_))) else { return };
    let ProtocolData::Dns(msg) = &dns_pdu.data else { unreachable!() };
    if !msg.qr {
        return;
    }
    for record in &msg.answers {
        if let crate::proto::dns::DnsRData::A(octets) = &record.rdata {
            if let Ok(name) = std::str::from_utf8(record.name) {
                let addr = Ipv4Addr::from(*octets);
                dns_cache.insert(addr, name.to_string());
                hosts.resolve_name(addr, name);
            }
        }
    }
}

fn feed_host_analyzer(hosts: &mut HostAnalyzer, dns_cache: &DnsCache, packet: &Packet<'_>) {
    let Some(eth_pdu) = packet.root.find_by(|d| matches!(d, ProtocolData::Ethernet(_))) else { return };
    let ProtocolData::Ethernet(eth) = &eth_pdu.data else { unreachable!() };
    let Some(ip_pdu) = packet.root.find_by(|d| matches!(d, ProtocolData::Ipv4(_))) else { return };
    let ProtocolData::Ipv4(ip) = &ip_pdu.data else { unreachable!() };

    hosts.observe(Ipv4Addr::from(ip.src), eth.mac_src, dns_cache);
    hosts.observe(Ipv4Addr::from(ip.dst), eth.mac_dst, dns_cache);
}

fn feed_flow_analyzer(flow: &mut FlowAnalyzer, packet: &Packet<'_>) {
    let Some(ip_pdu) = packet.root.find_by(|d| matches!(d, ProtocolData::Ipv4(_))) else { return };
    let ProtocolData::Ipv4(ip) = &ip_pdu.data else { unreachable!() };
    let Some(tcp_pdu) = packet.root.find_by(|d| matches!(d, ProtocolData::Tcp(_))) else { return };
    let ProtocolData::Tcp(tcp) = &tcp_pdu.data else { unreachable!() };

    let src = Endpoint { addr: Ipv4Addr::from(ip.src).into(), port: tcp.src_port };
    let dst = Endpoint { addr: Ipv4Addr::from(ip.dst).into(), port: tcp.dst_port };
    flow.track(src, dst, tcp.flags);
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_ipv4_tcp(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, flags_byte: u8) -> Vec<u8> {
        let mut f = vec![0u8; 6]; // dst mac
        f.extend_from_slice(&[0, 0, 0, 0, 0, 1]); // src mac
        f.extend_from_slice(&0x0800u16.to_be_bytes());
        f.push(0x45);
        f.push(0);
        f.extend_from_slice(&40u16.to_be_bytes());
        f.extend_from_slice(&[0, 0, 0, 0]);
        f.push(64);
        f.push(6); // TCP
        f.extend_from_slice(&[0, 0]);
        f.extend_from_slice(&src);
        f.extend_from_slice(&dst);
        f.extend_from_slice(&src_port.to_be_bytes());
        f.extend_from_slice(&dst_port.to_be_bytes());
        f.extend_from_slice(&0u32.to_be_bytes()); // seq
        f.extend_from_slice(&0u32.to_be_bytes()); // ack
        f.push(5 << 4); // data offset, no options
        f.push(flags_byte);
        f.extend_from_slice(&0u16.to_be_bytes()); // window
        f.extend_from_slice(&0u16.to_be_bytes()); // checksum
        f.extend_from_slice(&0u16.to_be_bytes()); // urgent ptr
        f
    }

    #[test]
    fn ingesting_a_tcp_packet_populates_hosts_and_flow() {
        let mut session = Session::new();
        let frame = eth_ipv4_tcp([10, 0, 0, 1], [8, 8, 8, 8], 54321, 443, 0x02 /* SYN */);
        let packet = session.ingest(0, 0, frame.len(), &frame);
        assert!(packet.is_ok());

        assert!(session.hosts.get(Ipv4Addr::new(10, 0, 0, 1)).is_some());
        assert!(session.hosts.get(Ipv4Addr::new(8, 8, 8, 8)).is_some());
        assert_eq!(session.flow.sessions().count(), 1);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut session = Session::new();
        let frame = eth_ipv4_tcp([10, 0, 0, 1], [8, 8, 8, 8], 1, 2, 0x02);
        let p1 = session.ingest(0, 0, frame.len(), &frame);
        assert_eq!(p1.seq, 0);
        drop(p1);
        let p2 = session.ingest(0, 0, frame.len(), &frame);
        assert_eq!(p2.seq, 1);
    }
}
