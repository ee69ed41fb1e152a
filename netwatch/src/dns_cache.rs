//! IPv4 -> hostname cache (§4.9 Data Model, "DNS name cache"). Grounded on
//! `dns_cache.c`: a fixed-size map with no eviction policy, where inserts
//! publish and removals don't.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::pubsub::Topic2;

const INITIAL_BUCKETS: usize = 1024;

/// Global to the capture session, never evicts -- names live as long as
/// the session does (the original's cache strings are unowned pointers
/// into the decoder arena; here they're plain owned `String`s since the
/// cache outlives any single packet's arena generation).
pub struct DnsCache {
    entries: HashMap<Ipv4Addr, String>,
    pub resolved: Topic2<Ipv4Addr, String>,
}

impl Default for DnsCache {
    fn default() -> Self {
        DnsCache { entries: HashMap::with_capacity(INITIAL_BUCKETS), resolved: Topic2::new() }
    }
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `addr -> name`, publishing the change. A
    /// redundant insert of the same name is still published -- the cache
    /// does not attempt change detection, matching the grounding's
    /// unconditional `publish2` after a successful `hashmap_insert`.
    pub fn insert(&mut self, addr: Ipv4Addr, name: String) {
        self.entries.insert(addr, name.clone());
        self.resolved.publish(&addr, &name);
    }

    /// Remove `addr`, if present. Does not publish (§4.9: "remove does
    /// not").
    pub fn remove(&mut self, addr: Ipv4Addr) {
        self.entries.remove(&addr);
    }

    pub fn get(&self, addr: Ipv4Addr) -> Option<&str> {
        self.entries.get(&addr).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn insert_publishes_and_is_retrievable() {
        let mut cache = DnsCache::new();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        cache.resolved.subscribe(move |addr, name| *seen2.borrow_mut() = Some((*addr, name.clone())));

        let addr = Ipv4Addr::new(93, 184, 216, 34);
        cache.insert(addr, "example.com".to_string());

        assert_eq!(cache.get(addr), Some("example.com"));
        assert_eq!(*seen.borrow(), Some((addr, "example.com".to_string())));
    }

    #[test]
    fn remove_does_not_publish() {
        let mut cache = DnsCache::new();
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        cache.insert(addr, "host.local".to_string());

        let publish_count = Rc::new(RefCell::new(0));
        let publish_count2 = publish_count.clone();
        cache.resolved.subscribe(move |_, _| *publish_count2.borrow_mut() += 1);

        cache.remove(addr);
        assert_eq!(cache.get(addr), None);
        assert_eq!(*publish_count.borrow(), 0);
    }

    #[test]
    fn unknown_address_is_none() {
        let cache = DnsCache::new();
        assert_eq!(cache.get(Ipv4Addr::new(1, 1, 1, 1)), None);
    }
}
