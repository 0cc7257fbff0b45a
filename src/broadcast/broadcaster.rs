//! Broadcaster
//!
//! Holds the ordered, non-owning subscriber list and performs fan-out.
//!
//! ## Rules
//! - **Order**: sequential rounds visit subscribers in registration order
//! - **Duplicates**: registering the same subscriber twice delivers twice
//! - **Removal**: `remove` drops the first matching entry only; order of the rest is kept
//! - **Snapshot**: `notify` copies the live handles, releases the lock, then dispatches,
//!   so `register`/`remove` from inside `receive` only affect the next round
//! - **Isolation**: an error or panic in one subscriber never stops later ones
//! - **Ownership**: entries are `Weak`; a subscriber dropped by its owner is skipped
//!   and pruned on the next mutation

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::broadcast::config::{BroadcasterConfig, DispatchMode};
use crate::broadcast::error::{BroadcastResult, DeliveryError};
use crate::broadcast::report::{DeliveryFailure, DeliveryReport, DeliveryStats};
use crate::broadcast::traits::Subscriber;

/// Ordered fan-out to registered subscribers.
///
/// Cloning yields another handle onto the same subscriber list and statistics,
/// which is how a subscriber gets hold of the broadcaster it is registered with.
pub struct Broadcaster<P: ?Sized + 'static = str> {
    subscribers: Arc<RwLock<Vec<Weak<dyn Subscriber<P>>>>>,
    stats: Arc<Mutex<DeliveryStats>>,
    config: BroadcasterConfig,
}

impl<P: ?Sized + 'static> Broadcaster<P> {
    pub fn new() -> Self {
        Self::with_config(BroadcasterConfig::default())
    }

    pub fn with_config(config: BroadcasterConfig) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(Mutex::new(DeliveryStats::default())),
            config,
        }
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Append `subscriber` to the end of the list.
    ///
    /// Only a weak handle is kept; the caller stays responsible for keeping the
    /// subscriber alive. No uniqueness check is made.
    pub fn register<S>(&self, subscriber: &Arc<S>)
    where
        S: Subscriber<P> + 'static,
    {
        let entry = Arc::downgrade(subscriber);
        let entry: Weak<dyn Subscriber<P>> = entry;
        self.insert(entry, subscriber.name());
    }

    /// [`register`](Self::register) for an already type-erased handle
    pub fn register_dyn(&self, subscriber: &Arc<dyn Subscriber<P>>) {
        self.insert(Arc::downgrade(subscriber), subscriber.name());
    }

    fn insert(&self, entry: Weak<dyn Subscriber<P>>, name: &str) {
        let mut subscribers = self.subscribers.write();
        let pruned = prune_expired(&mut subscribers);
        subscribers.push(entry);
        debug!(
            "Registered subscriber '{}' ({} registered, {} expired pruned)",
            name,
            subscribers.len(),
            pruned
        );
    }

    /// Remove the first entry for `subscriber`.
    ///
    /// Returns `false` when it was not registered; that is not an error, and the
    /// list is left untouched. A successful removal also prunes expired entries.
    pub fn remove<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber<P> + 'static,
    {
        self.remove_first(address_of(subscriber), subscriber.name())
    }

    /// [`remove`](Self::remove) for an already type-erased handle
    pub fn remove_dyn(&self, subscriber: &Arc<dyn Subscriber<P>>) -> bool {
        self.remove_first(address_of(subscriber), subscriber.name())
    }

    fn remove_first(&self, target: *const (), name: &str) -> bool {
        let mut subscribers = self.subscribers.write();
        let removed = match subscribers.iter().position(|entry| refers_to(entry, target)) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        };

        if removed {
            prune_expired(&mut subscribers);
            debug!("Removed subscriber '{}' ({} remaining)", name, subscribers.len());
        } else {
            debug!("Subscriber '{}' not registered, nothing removed", name);
        }
        removed
    }

    /// Remove every entry for `subscriber`, returning how many were dropped
    pub fn remove_all<S>(&self, subscriber: &Arc<S>) -> usize
    where
        S: Subscriber<P> + 'static,
    {
        let target = address_of(subscriber);
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|entry| !refers_to(entry, target));
        let removed = before - subscribers.len();
        prune_expired(&mut subscribers);

        debug!(
            "Removed {} entries for subscriber '{}' ({} remaining)",
            removed,
            subscriber.name(),
            subscribers.len()
        );
        removed
    }

    pub fn contains<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber<P> + 'static,
    {
        let target = address_of(subscriber);
        self.subscribers.read().iter().any(|entry| refers_to(entry, target))
    }

    /// Number of live entries (duplicates counted)
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of live subscribers in registration order
    pub fn subscriber_names(&self) -> Vec<String> {
        self.subscribers
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|subscriber| subscriber.name().to_string())
            .collect()
    }

    pub fn clear(&self) {
        let mut subscribers = self.subscribers.write();
        let count = subscribers.len();
        subscribers.clear();
        debug!("Cleared {} subscriber entries", count);
    }

    /// Drop entries whose subscriber has been dropped by its owner
    pub fn prune(&self) -> usize {
        let pruned = prune_expired(&mut self.subscribers.write());
        if pruned > 0 {
            debug!("Pruned {} expired subscriber entries", pruned);
        }
        pruned
    }

    /// Live handles in registration order, plus the number of expired entries
    fn snapshot(&self) -> (Vec<Arc<dyn Subscriber<P>>>, usize) {
        let subscribers = self.subscribers.read();
        let live: Vec<_> = subscribers.iter().filter_map(Weak::upgrade).collect();
        let expired = subscribers.len() - live.len();
        (live, expired)
    }

    /// Deliver `payload` to every live subscriber and wait for all of them.
    ///
    /// The subscriber list is snapshotted first; changes made while the round
    /// is in flight apply to the next round. Failures are collected in the
    /// returned report rather than aborting the round.
    pub fn notify(&self, payload: &P) -> DeliveryReport<P>
    where
        P: Sync,
    {
        let (snapshot, expired) = self.snapshot();
        if snapshot.is_empty() {
            let report = DeliveryReport::empty(expired);
            self.stats.lock().record(&report);
            debug!("Notify with no live subscribers ({} expired)", expired);
            return report;
        }

        let start_time = Instant::now();
        let isolate_panics = self.config.isolate_panics;
        let outcomes: Vec<Result<(), DeliveryError>> = match self.config.dispatch {
            DispatchMode::Sequential => snapshot
                .iter()
                .map(|subscriber| deliver(subscriber.as_ref(), payload, isolate_panics))
                .collect(),
            DispatchMode::Parallel => snapshot
                .par_iter()
                .map(|subscriber| deliver(subscriber.as_ref(), payload, isolate_panics))
                .collect(),
        };

        let mut report = DeliveryReport {
            attempted: snapshot.len(),
            delivered: 0,
            expired,
            failures: Vec::new(),
        };

        for (position, (subscriber, outcome)) in snapshot.into_iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    let name = subscriber.name().to_string();
                    warn!(
                        "Failed to deliver to subscriber '{}' at position {} ({}): {}",
                        name,
                        position,
                        error.as_label(),
                        error
                    );
                    report.failures.push(DeliveryFailure {
                        position,
                        name,
                        subscriber,
                        error,
                    });
                }
            }
        }

        self.stats.lock().record(&report);
        debug!(
            "Notified {} subscribers ({} delivered, {} failed, {} expired) in {:?}",
            report.attempted,
            report.delivered,
            report.failures.len(),
            report.expired,
            start_time.elapsed()
        );
        report
    }

    /// [`notify`](Self::notify), turning any failure into an error
    pub fn notify_checked(&self, payload: &P) -> BroadcastResult<DeliveryReport<P>>
    where
        P: Sync,
    {
        self.notify(payload).into_result()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = DeliveryStats::default();
    }
}

fn deliver<P: ?Sized>(
    subscriber: &dyn Subscriber<P>,
    payload: &P,
    isolate_panics: bool,
) -> Result<(), DeliveryError> {
    if !isolate_panics {
        return subscriber.receive(payload).map_err(DeliveryError::Failed);
    }
    match panic::catch_unwind(AssertUnwindSafe(|| subscriber.receive(payload))) {
        Ok(result) => result.map_err(DeliveryError::Failed),
        Err(panic) => Err(DeliveryError::from_panic(panic)),
    }
}

fn address_of<T: ?Sized>(subscriber: &Arc<T>) -> *const () {
    Arc::as_ptr(subscriber).cast::<()>()
}

// An expired entry still pins its allocation, so a live subscriber can never
// share an address with one.
fn refers_to<P: ?Sized>(entry: &Weak<dyn Subscriber<P>>, target: *const ()) -> bool {
    entry.as_ptr().cast::<()>() == target
}

fn prune_expired<P: ?Sized>(subscribers: &mut Vec<Weak<dyn Subscriber<P>>>) -> usize {
    let before = subscribers.len();
    subscribers.retain(|entry| entry.strong_count() > 0);
    before - subscribers.len()
}

impl<P: ?Sized + 'static> Default for Broadcaster<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized + 'static> Clone for Broadcaster<P> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
        }
    }
}
