//! Host analyzer (§4.8): classifies every IPv4 address it sees as local or
//! remote and tracks it in the matching table. Grounded on
//! `host_analyzer.c`, with its local/remote test rewritten against
//! `std::net::Ipv4Addr` octets instead of the original's endianness-
//! dependent bit tricks on a packed `uint32_t` (a straight octet compare
//! reads the same on every host and needs no `#cfg` for byte order).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::dns_cache::DnsCache;
use crate::pubsub::Topic;

#[derive(Debug, Clone)]
pub struct HostInfo {
    pub addr: Ipv4Addr,
    pub local: bool,
    pub mac: Option<[u8; 6]>,
    pub name: Option<String>,
}

/// `true` if `addr` falls in one of the RFC 1918 private ranges
/// (10/8, 172.16/12, 192.168/16).
pub fn is_local(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 10 || (o[0] == 172 && (16..=31).contains(&o[1])) || (o[0] == 192 && o[1] == 168)
}

pub struct HostAnalyzer {
    local_hosts: HashMap<Ipv4Addr, HostInfo>,
    remote_hosts: HashMap<Ipv4Addr, HostInfo>,
    pub host_added: Topic<Ipv4Addr>,
    pub host_name_resolved: Topic<Ipv4Addr>,
}

impl Default for HostAnalyzer {
    fn default() -> Self {
        HostAnalyzer {
            local_hosts: HashMap::new(),
            remote_hosts: HashMap::new(),
            host_added: Topic::new(),
            host_name_resolved: Topic::new(),
        }
    }
}

impl HostAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, local: bool) -> &mut HashMap<Ipv4Addr, HostInfo> {
        if local {
            &mut self.local_hosts
        } else {
            &mut self.remote_hosts
        }
    }

    /// Classify and record one IPv4 endpoint. `mac` is the frame's source
    /// or destination link-layer address and is attached only for local
    /// hosts (a remote host's MAC is the next hop's, not the host's own,
    /// so the original never records it either). Duplicate inserts are
    /// ignored.
    pub fn observe(&mut self, addr: Ipv4Addr, mac: [u8; 6], dns_cache: &DnsCache) {
        let local = is_local(addr);
        if self.table_mut(local).contains_key(&addr) {
            return;
        }
        let host = HostInfo {
            addr,
            local,
            mac: local.then_some(mac),
            name: dns_cache.get(addr).map(str::to_string),
        };
        self.table_mut(local).insert(addr, host);
        self.host_added.publish(&addr);
    }

    /// Called when the DNS cache resolves `addr` to `name`. Attaches the
    /// name only if the host is already known and doesn't have one yet
    /// (first resolution wins, matching the grounding's `!host->name`
    /// guard).
    pub fn resolve_name(&mut self, addr: Ipv4Addr, name: &str) {
        let local = is_local(addr);
        if let Some(host) = self.table_mut(local).get_mut(&addr) {
            if host.name.is_none() {
                host.name = Some(name.to_string());
                self.host_name_resolved.publish(&addr);
            }
        }
    }

    pub fn local_hosts(&self) -> impl Iterator<Item = &HostInfo> {
        self.local_hosts.values()
    }

    pub fn remote_hosts(&self) -> impl Iterator<Item = &HostInfo> {
        self.remote_hosts.values()
    }

    pub fn get(&self, addr: Ipv4Addr) -> Option<&HostInfo> {
        self.local_hosts.get(&addr).or_else(|| self.remote_hosts.get(&addr))
    }

    pub fn clear(&mut self) {
        self.local_hosts.clear();
        self.remote_hosts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

    #[test]
    fn classifies_rfc1918_ranges_as_local() {
        assert!(is_local(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(is_local(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_local(Ipv4Addr::new(172, 31, 255, 254)));
        assert!(is_local(Ipv4Addr::new(192, 168, 0, 1)));
        assert!(!is_local(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_local(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn local_host_gets_mac_remote_does_not() {
        let mut hosts = HostAnalyzer::new();
        let cache = DnsCache::new();
        hosts.observe(Ipv4Addr::new(10, 0, 0, 5), MAC, &cache);
        hosts.observe(Ipv4Addr::new(93, 184, 216, 34), MAC, &cache);

        let local = hosts.get(Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        assert_eq!(local.mac, Some(MAC));
        assert!(local.local);

        let remote = hosts.get(Ipv4Addr::new(93, 184, 216, 34)).unwrap();
        assert_eq!(remote.mac, None);
        assert!(!remote.local);
    }

    #[test]
    fn duplicate_observe_is_ignored() {
        let mut hosts = HostAnalyzer::new();
        let cache = DnsCache::new();
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let calls2 = calls.clone();
        hosts.host_added.subscribe(move |_| calls2.set(calls2.get() + 1));

        let addr = Ipv4Addr::new(10, 0, 0, 5);
        hosts.observe(addr, MAC, &cache);
        hosts.observe(addr, [0xff; 6], &cache);

        assert_eq!(calls.get(), 1);
        assert_eq!(hosts.get(addr).unwrap().mac, Some(MAC));
    }

    #[test]
    fn resolving_name_after_host_is_known_publishes_once() {
        let mut hosts = HostAnalyzer::new();
        let cache = DnsCache::new();
        let addr = Ipv4Addr::new(93, 184, 216, 34);
        hosts.observe(addr, MAC, &cache);

        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let calls2 = calls.clone();
        hosts.host_name_resolved.subscribe(move |_| calls2.set(calls2.get() + 1));

        hosts.resolve_name(addr, "example.com");
        hosts.resolve_name(addr, "ignored-second-name.example");

        assert_eq!(hosts.get(addr).unwrap().name.as_deref(), Some("example.com"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn host_already_named_at_insert_time_does_not_republish() {
        let mut hosts = HostAnalyzer::new();
        let mut cache = DnsCache::new();
        let addr = Ipv4Addr::new(93, 184, 216, 34);
        cache.insert(addr, "example.com".to_string());

        hosts.observe(addr, MAC, &cache);
        assert_eq!(hosts.get(addr).unwrap().name.as_deref(), Some("example.com"));
    }
}
