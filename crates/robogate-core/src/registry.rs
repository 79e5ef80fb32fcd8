//! Tag-keyed subscription registry with bounded fan-out delivery.
//!
//! Every peer owns one registry. RPC handlers subscribe to the message
//! tag they expect, the peer's inbound pump delivers each decoded
//! message to every subscriber of its tag, and handlers release their
//! subscription when they are done (or simply drop it).
//!
//! Delivery is best-effort with a hard per-subscriber timeout: a
//! handler that stops draining its queue would otherwise stall the
//! pump for every other subscriber, so it is evicted instead and its
//! queue is closed. Lost responses surface to the caller as deadline
//! errors.
//!
//! Lock discipline: mutations (subscribe, release, evict) take the
//! write lock; fan-out takes the read lock only long enough to
//! snapshot the subscriber list, then delivers without any lock held.
//! Evictions collected during delivery are applied in one write-lock
//! pass afterwards, tolerating releases that raced with the delivery.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, warn};

/// How long one subscriber may block delivery before eviction.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_millis(250);

/// Marker bounds for registry keys: small copyable discriminants.
pub trait MessageTag: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> MessageTag for T where T: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// A tag already has an active subscription.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("tag already has an active subscription")]
pub struct TagBusy;

/// Outcome of one fan-out call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that accepted the message.
    pub delivered: usize,
    /// Subscribers evicted for timing out.
    pub evicted: usize,
}

struct Entry<M> {
    id: u64,
    tx: mpsc::Sender<M>,
}

type Table<T, M> = HashMap<T, Vec<Entry<M>>>;

/// Tag-keyed table of bounded subscriber queues.
pub struct Registry<T: MessageTag, M> {
    table: Arc<RwLock<Table<T, M>>>,
    next_id: Arc<AtomicU64>,
}

impl<T: MessageTag, M> Clone for Registry<T, M> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: MessageTag, M> Default for Registry<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MessageTag, M> Registry<T, M> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to `tag` with a queue of `capacity` messages.
    ///
    /// Multiple concurrent subscriptions to the same tag are allowed;
    /// each receives its own copy of every delivered message.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn subscribe(&self, tag: T, capacity: usize) -> Subscription<T, M> {
        let (entry, sub) = self.make_subscription(tag, capacity);
        let mut table = self.table.write().expect("registry lock poisoned");
        table.entry(tag).or_default().push(entry);
        debug!(?tag, "listening");
        sub
    }

    /// Subscribe to `tag`, failing if any subscription for it exists.
    ///
    /// The check and the insert happen under one write-lock acquisition,
    /// so two concurrent callers cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`TagBusy`] when `tag` already has an active subscription.
    pub fn subscribe_unique(&self, tag: T, capacity: usize) -> Result<Subscription<T, M>, TagBusy> {
        let mut table = self.table.write().expect("registry lock poisoned");
        if table.get(&tag).is_some_and(|subs| !subs.is_empty()) {
            return Err(TagBusy);
        }
        let (entry, sub) = self.make_subscription(tag, capacity);
        table.entry(tag).or_default().push(entry);
        debug!(?tag, "listening (unique)");
        Ok(sub)
    }

    /// Whether `tag` currently has at least one subscriber.
    #[must_use]
    pub fn has_subscribers(&self, tag: T) -> bool {
        self.table
            .read()
            .expect("registry lock poisoned")
            .get(&tag)
            .is_some_and(|subs| !subs.is_empty())
    }

    fn make_subscription(&self, tag: T, capacity: usize) -> (Entry<M>, Subscription<T, M>) {
        assert!(capacity > 0, "subscription capacity must be non-zero");
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity);
        let entry = Entry { id, tx };
        let sub = Subscription {
            tag,
            id,
            rx,
            table: Arc::clone(&self.table),
            released: false,
        };
        (entry, sub)
    }
}

impl<T: MessageTag, M: Clone + Send + 'static> Registry<T, M> {
    /// Fan `msg` out to every subscriber of `tag`.
    ///
    /// Deliveries run concurrently; the call returns once every attempt
    /// has concluded, so two `deliver` calls from the same pump are
    /// observed by every subscriber in pump order. A subscriber whose
    /// queue stays full for [`DELIVERY_TIMEOUT`] is evicted and its
    /// queue closed before this call returns.
    pub async fn deliver(&self, tag: T, msg: M) -> DeliveryReport {
        let snapshot: Vec<(u64, mpsc::Sender<M>)> = {
            let table = self.table.read().expect("registry lock poisoned");
            match table.get(&tag) {
                // No listeners for this message.
                None => return DeliveryReport::default(),
                Some(subs) => subs.iter().map(|e| (e.id, e.tx.clone())).collect(),
            }
        };

        let attempts = snapshot.into_iter().map(|(id, tx)| {
            let msg = msg.clone();
            async move {
                match tx.send_timeout(msg, DELIVERY_TIMEOUT).await {
                    Ok(()) => SendResult::Delivered,
                    Err(SendTimeoutError::Timeout(_)) => SendResult::TimedOut(id),
                    // Receiver released mid-delivery; nothing to clean up.
                    Err(SendTimeoutError::Closed(_)) => SendResult::Gone,
                }
            }
        });

        let mut report = DeliveryReport::default();
        let mut stale = Vec::new();
        for result in futures::future::join_all(attempts).await {
            match result {
                SendResult::Delivered => report.delivered += 1,
                SendResult::TimedOut(id) => {
                    warn!(?tag, subscriber = id, "subscriber timed out on delivery, evicting");
                    stale.push(id);
                }
                SendResult::Gone => {}
            }
        }

        if !stale.is_empty() {
            report.evicted = stale.len();
            let mut table = self.table.write().expect("registry lock poisoned");
            for id in stale {
                remove_entry(&mut table, tag, id);
            }
        }
        report
    }
}

enum SendResult {
    Delivered,
    TimedOut(u64),
    Gone,
}

fn remove_entry<T: MessageTag, M>(table: &mut Table<T, M>, tag: T, id: u64) {
    if let Some(subs) = table.get_mut(&tag) {
        // May already be gone when an eviction races a release.
        subs.retain(|e| e.id != id);
        if subs.is_empty() {
            table.remove(&tag);
        }
    }
}

/// One handler's bounded delivery queue for a single tag.
///
/// The subscription is removed from the registry on [`release`] or on
/// drop, whichever comes first; after that no future delivery enqueues
/// into it and `recv` drains whatever is already buffered before
/// returning `None`.
///
/// [`release`]: Subscription::release
pub struct Subscription<T: MessageTag, M> {
    tag: T,
    id: u64,
    rx: mpsc::Receiver<M>,
    table: Arc<RwLock<Table<T, M>>>,
    released: bool,
}

impl<T: MessageTag, M> Subscription<T, M> {
    /// Tag this subscription is registered under.
    #[must_use]
    pub fn tag(&self) -> T {
        self.tag
    }

    /// Receive the next delivered message.
    ///
    /// Returns `None` once the queue is closed (released or evicted)
    /// and drained.
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Remove this subscription from the registry and close its queue.
    ///
    /// Idempotent, and safe to call while a delivery is in flight:
    /// an in-flight send observes the closed queue instead of
    /// enqueueing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.rx.close();
        let mut table = self.table.write().expect("registry lock poisoned");
        remove_entry(&mut table, self.tag, self.id);
    }
}

impl<T: MessageTag, M> Drop for Subscription<T, M> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: MessageTag, M> fmt::Debug for Subscription<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("tag", &self.tag)
            .field("id", &self.id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestTag {
        Alpha,
        Beta,
    }

    #[tokio::test]
    async fn test_deliver_reaches_every_subscriber() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut a = registry.subscribe(TestTag::Alpha, 4);
        let mut b = registry.subscribe(TestTag::Alpha, 4);

        let report = registry.deliver(TestTag::Alpha, 7).await;
        assert_eq!(report, DeliveryReport { delivered: 2, evicted: 0 });
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_deliver_without_subscribers_is_noop() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let report = registry.deliver(TestTag::Beta, 1).await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_deliver_respects_tag_boundaries() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut a = registry.subscribe(TestTag::Alpha, 1);
        let _b = registry.subscribe(TestTag::Beta, 1);

        registry.deliver(TestTag::Beta, 9).await;
        registry.deliver(TestTag::Alpha, 1).await;
        assert_eq!(a.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_release_stops_future_deliveries() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut sub = registry.subscribe(TestTag::Alpha, 4);
        registry.deliver(TestTag::Alpha, 1).await;
        sub.release();

        let report = registry.deliver(TestTag::Alpha, 2).await;
        assert_eq!(report.delivered, 0);

        // Buffered message survives release; then the queue is done.
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut sub = registry.subscribe(TestTag::Alpha, 1);
        sub.release();
        sub.release();
        assert!(!registry.has_subscribers(TestTag::Alpha));
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let registry: Registry<TestTag, u32> = Registry::new();
        {
            let _sub = registry.subscribe(TestTag::Alpha, 1);
            assert!(registry.has_subscribers(TestTag::Alpha));
        }
        assert!(!registry.has_subscribers(TestTag::Alpha));
    }

    #[tokio::test]
    async fn test_unique_subscription_excludes_everyone() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let first = registry.subscribe_unique(TestTag::Alpha, 1).unwrap();
        assert_eq!(registry.subscribe_unique(TestTag::Alpha, 1).unwrap_err(), TagBusy);

        drop(first);
        assert!(registry.subscribe_unique(TestTag::Alpha, 1).is_ok());
    }

    #[tokio::test]
    async fn test_unique_blocked_by_shared_subscription() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let _shared = registry.subscribe(TestTag::Alpha, 1);
        assert!(registry.subscribe_unique(TestTag::Alpha, 1).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_unique_subscriptions_one_winner() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            // Return the handle so the winner stays subscribed until
            // every attempt has finished.
            tasks.push(tokio::spawn(async move {
                registry.subscribe_unique(TestTag::Alpha, 1).ok()
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert_eq!(handles.iter().filter(|h| h.is_some()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_is_evicted() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut fast = registry.subscribe(TestTag::Alpha, 1);
        let mut slow = registry.subscribe(TestTag::Alpha, 1);

        // First delivery fills both queues; only the fast one drains.
        let report = registry.deliver(TestTag::Alpha, 1).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(fast.recv().await, Some(1));

        // Second delivery finds the slow queue still full and evicts it.
        let report = registry.deliver(TestTag::Alpha, 2).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(fast.recv().await, Some(2));

        // Evicted queue drains its backlog, then closes.
        assert_eq!(slow.recv().await, Some(1));
        assert_eq!(slow.recv().await, None);

        // The fast subscriber keeps receiving.
        registry.deliver(TestTag::Alpha, 3).await;
        assert_eq!(fast.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_per_subscriber_ordering_matches_deliver_order() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut sub = registry.subscribe(TestTag::Alpha, 16);
        for i in 0..10 {
            registry.deliver(TestTag::Alpha, i).await;
        }
        for i in 0..10 {
            assert_eq!(sub.recv().await, Some(i));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_during_blocked_delivery_does_not_enqueue() {
        let registry: Registry<TestTag, u32> = Registry::new();
        let mut sub = registry.subscribe(TestTag::Alpha, 1);
        registry.deliver(TestTag::Alpha, 1).await;

        let deliver = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.deliver(TestTag::Alpha, 2).await })
        };
        tokio::task::yield_now().await;
        sub.release();

        let report = deliver.await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }
}
