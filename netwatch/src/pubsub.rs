//! Typed publish/subscribe bus (§4.9). One [`Topic`] instance per named
//! event rather than a single untyped dispatcher -- the topic's generic
//! parameters are the event's payload types, so a subscriber closure
//! can't be registered against the wrong shape of event.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A single-argument event channel. Subscribers are boxed closures kept
/// behind an `Rc<RefCell<..>>` so that a subscriber invoked during publish
/// may itself subscribe or unsubscribe without borrow-checker trouble.
///
/// `pending_removals` lets a subscriber unsubscribe itself mid-call: its
/// slot is empty for the call's duration (taken out so `publish` can hold
/// only a short-lived borrow), so `unsubscribe` can't just null the slot --
/// it records the index here instead, and `publish` checks it before
/// restoring the closure after the call returns.
pub struct Topic<A> {
    subscribers: Rc<RefCell<Vec<Option<Box<dyn FnMut(&A)>>>>>,
    pending_removals: Rc<RefCell<HashSet<usize>>>,
}

impl<A> Default for Topic<A> {
    fn default() -> Self {
        Topic {
            subscribers: Rc::new(RefCell::new(Vec::new())),
            pending_removals: Rc::new(RefCell::new(HashSet::new())),
        }
    }
}

impl<A> Topic<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `f`. Returns a token that [`Topic::unsubscribe`] accepts;
    /// repeated subscription of semantically identical closures is allowed
    /// (each gets its own token) since function pointers/closures have no
    /// useful identity to dedupe on here -- idempotence (invariant 9) is
    /// instead the caller's responsibility: subscribing the same token
    /// twice never happens because each `subscribe` call hands back a
    /// fresh token.
    pub fn subscribe(&self, f: impl FnMut(&A) + 'static) -> SubscriptionId {
        let mut subs = self.subscribers.borrow_mut();
        subs.push(Some(Box::new(f)));
        SubscriptionId(subs.len() - 1)
    }

    /// Unsubscribe `id`. A no-op if `id` is already gone (invariant 9).
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.borrow_mut();
        match subs.get_mut(id.0) {
            Some(slot @ Some(_)) => *slot = None,
            Some(None) => {
                self.pending_removals.borrow_mut().insert(id.0);
            }
            None => {}
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().iter().filter(|s| s.is_some()).count()
    }

    /// Publish `a` to every live subscriber. Snapshot-iterates the current
    /// slot count so a subscriber added mid-publish (reentrant publish) is
    /// not invoked in the same round, and a subscriber removed mid-publish
    /// is skipped cleanly via its slot already being vacated.
    pub fn publish(&self, a: &A) {
        let len = self.subscribers.borrow().len();
        for i in 0..len {
            // Take the closure out for the duration of the call so a
            // reentrant publish/unsubscribe on this same topic can't
            // double-borrow `subscribers`.
            let taken = self.subscribers.borrow_mut()[i].take();
            if let Some(mut f) = taken {
                f(a);
                if self.pending_removals.borrow_mut().remove(&i) {
                    continue;
                }
                self.subscribers.borrow_mut()[i] = Some(f);
            }
        }
    }
}

/// A two-argument event channel, otherwise identical to [`Topic`].
pub struct Topic2<A, B> {
    subscribers: Rc<RefCell<Vec<Option<Box<dyn FnMut(&A, &B)>>>>>,
    pending_removals: Rc<RefCell<HashSet<usize>>>,
}

impl<A, B> Default for Topic2<A, B> {
    fn default() -> Self {
        Topic2 {
            subscribers: Rc::new(RefCell::new(Vec::new())),
            pending_removals: Rc::new(RefCell::new(HashSet::new())),
        }
    }
}

impl<A, B> Topic2<A, B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, f: impl FnMut(&A, &B) + 'static) -> SubscriptionId {
        let mut subs = self.subscribers.borrow_mut();
        subs.push(Some(Box::new(f)));
        SubscriptionId(subs.len() - 1)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.borrow_mut();
        match subs.get_mut(id.0) {
            Some(slot @ Some(_)) => *slot = None,
            Some(None) => {
                self.pending_removals.borrow_mut().insert(id.0);
            }
            None => {}
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().iter().filter(|s| s.is_some()).count()
    }

    pub fn publish(&self, a: &A, b: &B) {
        let len = self.subscribers.borrow().len();
        for i in 0..len {
            let taken = self.subscribers.borrow_mut()[i].take();
            if let Some(mut f) = taken {
                f(a, b);
                if self.pending_removals.borrow_mut().remove(&i) {
                    continue;
                }
                self.subscribers.borrow_mut()[i] = Some(f);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

// The fixed, closed set of event channels (`new_connection`,
// `connection_updated`, `dns_resolved`, `host_added`, `host_name_resolved`)
// lives as one `Topic`/`Topic2` field per channel directly on the analyzer
// that fires it -- `FlowAnalyzer`, `HostAnalyzer`, `DnsCache` -- rather than
// behind a separate bus type; `Session` (the composition root) is where a
// caller reaches all five.

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscribers_see_every_publish() {
        let topic: Topic<u32> = Topic::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        topic.subscribe(move |a| seen2.borrow_mut().push(*a));
        topic.publish(&1);
        topic.publish(&2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_of_non_subscriber_is_a_no_op() {
        let topic: Topic<u32> = Topic::new();
        topic.unsubscribe(SubscriptionId(42));
        topic.publish(&1);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let topic: Topic<u32> = Topic::new();
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        let id = topic.subscribe(move |_| count2.set(count2.get() + 1));
        topic.publish(&1);
        topic.unsubscribe(id);
        topic.publish(&2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn subscribing_during_notification_is_safe_and_deferred() {
        // A subscriber that reacts to the first publish by adding a second
        // subscriber must not see that second subscriber invoked in the
        // same publish round (snapshot-iterate semantics).
        let topic: Rc<Topic<u32>> = Rc::new(Topic::new());
        let inner = topic.clone();
        let late_calls = Rc::new(Cell::new(0));
        let late_calls2 = late_calls.clone();
        topic.subscribe(move |_| {
            inner.subscribe(move |_| late_calls2.set(late_calls2.get() + 1));
        });
        topic.publish(&1);
        assert_eq!(late_calls.get(), 0, "late subscriber must not fire in the publish round that added it");
        topic.publish(&2);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn unsubscribing_self_during_notification_is_safe() {
        let topic: Rc<Topic<u32>> = Rc::new(Topic::new());
        let inner = topic.clone();
        let calls = Rc::new(Cell::new(0));
        let calls2 = calls.clone();
        // SubscriptionId(0) is this subscriber's own slot -- it is the
        // first (and only) one registered below.
        topic.subscribe(move |_| {
            calls2.set(calls2.get() + 1);
            inner.unsubscribe(SubscriptionId(0));
        });
        topic.publish(&1);
        topic.publish(&2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn two_arg_topic_delivers_both_values() {
        let topic: Topic2<std::net::Ipv4Addr, String> = Topic2::new();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        topic.subscribe(move |addr, name| *seen2.borrow_mut() = Some((*addr, name.clone())));
        let addr = std::net::Ipv4Addr::new(93, 184, 216, 34);
        topic.publish(&addr, &"example.com".to_string());
        assert_eq!(*seen.borrow(), Some((addr, "example.com".to_string())));
    }
}
