//! Thread-safe subscription registry.
//!
//! Maps (feed kind, instrument, subscriber) triples to subscription records.
//! This is the single shared-mutable surface of the adapter: callers mutate
//! it from arbitrary threads while the transport's delivery task queries it
//! during fan-out, so every operation goes through one mutex.
//!
//! The registry never invokes subscriber callbacks itself — [`matching`]
//! returns a snapshot taken under the lock, and the caller delivers outside
//! it. A subscriber whose `on_tick` re-enters `subscribe`/`unsubscribe`
//! therefore cannot deadlock.
//!
//! [`matching`]: SubscriptionRegistry::matching

use std::sync::{Arc, Mutex, Weak};

use tickwire_core::{CurrencyPair, FeedKind, Tick};

/// A local consumer of normalized ticks.
///
/// Invoked synchronously on the transport's delivery task, one subscriber at
/// a time; implementations should return promptly.
pub trait TickSubscriber: Send + Sync {
    fn on_tick(&self, tick: &Tick);
}

/// One registered interest. The subscriber reference is weak — the registry
/// dispatches to subscribers but never owns their lifecycle.
struct SubscriptionRecord {
    kind: FeedKind,
    pair: CurrencyPair,
    subscriber: Weak<dyn TickSubscriber>,
}

/// Concurrent registry of (kind, instrument, subscriber) subscriptions.
///
/// Records are kept in registration order, which makes fan-out order
/// deterministic.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<SubscriptionRecord>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `(kind, pair)` for `subscriber`.
    ///
    /// Idempotent: an identical triple already present is left untouched, so
    /// double subscription never causes double delivery. Subscriber identity
    /// is pointer identity of the `Arc`.
    pub fn subscribe(
        &self,
        kind: FeedKind,
        pair: CurrencyPair,
        subscriber: &Arc<dyn TickSubscriber>,
    ) {
        let target = Arc::downgrade(subscriber);
        let mut entries = self.entries.lock().unwrap();
        let exists = entries
            .iter()
            .any(|r| r.kind == kind && r.pair == pair && Weak::ptr_eq(&r.subscriber, &target));
        if !exists {
            entries.push(SubscriptionRecord {
                kind,
                pair,
                subscriber: target,
            });
        }
    }

    /// Remove the matching record if present; silent no-op when absent.
    pub fn unsubscribe(
        &self,
        kind: FeedKind,
        pair: &CurrencyPair,
        subscriber: &Arc<dyn TickSubscriber>,
    ) {
        let target = Arc::downgrade(subscriber);
        self.entries.lock().unwrap().retain(|r| {
            !(r.kind == kind && r.pair == *pair && Weak::ptr_eq(&r.subscriber, &target))
        });
    }

    /// Snapshot of the live subscribers registered for `pair`, optionally
    /// filtered by feed kind, in registration order.
    ///
    /// Dead records (whose subscriber has been dropped) are pruned as a side
    /// effect. The returned `Arc`s keep the subscribers alive for the
    /// duration of the delivery that follows — outside this lock.
    pub fn matching(
        &self,
        pair: &CurrencyPair,
        kind: Option<FeedKind>,
    ) -> Vec<Arc<dyn TickSubscriber>> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|r| r.subscriber.strong_count() > 0);
        entries
            .iter()
            .filter(|r| r.pair == *pair && kind.is_none_or(|k| r.kind == k))
            .filter_map(|r| r.subscriber.upgrade())
            .collect()
    }

    /// Number of live records (test/observability aid).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSubscriber {
        ticks: AtomicUsize,
    }

    impl TickSubscriber for CountingSubscriber {
        fn on_tick(&self, _tick: &Tick) {
            self.ticks.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn subscriber() -> Arc<dyn TickSubscriber> {
        Arc::new(CountingSubscriber::default())
    }

    fn btc_eth() -> CurrencyPair {
        CurrencyPair::new("BTC", "ETH")
    }

    #[test]
    fn subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber();

        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.matching(&btc_eth(), Some(FeedKind::Ticker)).len(), 1);
    }

    #[test]
    fn same_subscriber_distinct_triples() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber();

        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
        registry.subscribe(FeedKind::Trades, btc_eth(), &sub);
        registry.subscribe(FeedKind::Ticker, CurrencyPair::new("BTC", "XMR"), &sub);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.matching(&btc_eth(), Some(FeedKind::Ticker)).len(), 1);
        assert_eq!(registry.matching(&btc_eth(), None).len(), 2);
    }

    #[test]
    fn unsubscribe_absent_is_noop() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber();

        registry.unsubscribe(FeedKind::Ticker, &btc_eth(), &sub);
        assert!(registry.is_empty());

        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
        registry.unsubscribe(FeedKind::OrderBook, &btc_eth(), &sub);
        assert_eq!(registry.len(), 1);

        registry.unsubscribe(FeedKind::Ticker, &btc_eth(), &sub);
        assert!(registry.is_empty());
    }

    #[test]
    fn matching_is_exact_on_pair() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber();

        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
        assert!(
            registry
                .matching(&CurrencyPair::new("ETH", "BTC"), Some(FeedKind::Ticker))
                .is_empty()
        );
    }

    #[test]
    fn matching_preserves_registration_order() {
        let registry = SubscriptionRegistry::new();
        let first = subscriber();
        let second = subscriber();

        registry.subscribe(FeedKind::Ticker, btc_eth(), &first);
        registry.subscribe(FeedKind::Ticker, btc_eth(), &second);

        let matched = registry.matching(&btc_eth(), Some(FeedKind::Ticker));
        assert_eq!(matched.len(), 2);
        assert!(Arc::ptr_eq(&matched[0], &first));
        assert!(Arc::ptr_eq(&matched[1], &second));
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber();

        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
        drop(sub);

        assert!(registry.matching(&btc_eth(), None).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_mutation_is_safe() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let subs: Vec<Arc<dyn TickSubscriber>> = (0..8).map(|_| subscriber()).collect();

        let handles: Vec<_> = subs
            .iter()
            .cloned()
            .map(|sub| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
                        registry.matching(&btc_eth(), Some(FeedKind::Ticker));
                        registry.unsubscribe(FeedKind::Ticker, &btc_eth(), &sub);
                    }
                    registry.subscribe(FeedKind::Ticker, btc_eth(), &sub);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
    }
}
