//! Delivery Reports and Statistics
//!
//! A [`DeliveryReport`] describes one notification round; [`DeliveryStats`]
//! accumulates across rounds for the lifetime of a broadcaster.

use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::broadcast::error::{BroadcastError, BroadcastResult, DeliveryError};
use crate::broadcast::traits::Subscriber;

/// One subscriber that did not accept the payload
pub struct DeliveryFailure<P: ?Sized + 'static = str> {
    /// Position of the subscriber in the round's snapshot
    pub position: usize,
    /// Subscriber name at the time of delivery
    pub name: String,
    /// Handle to the failing subscriber, for identity checks
    pub subscriber: Arc<dyn Subscriber<P>>,
    pub error: DeliveryError,
}

impl<P: ?Sized + 'static> DeliveryFailure<P> {
    /// True if this failure belongs to `subscriber` (instance identity)
    pub fn is<S: Subscriber<P> + 'static>(&self, subscriber: &Arc<S>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.subscriber), Arc::as_ptr(subscriber))
    }
}

impl<P: ?Sized + 'static> fmt::Debug for DeliveryFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryFailure")
            .field("position", &self.position)
            .field("name", &self.name)
            .field("error", &self.error)
            .finish()
    }
}

impl<P: ?Sized + 'static> fmt::Display for DeliveryFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// Outcome of a single `notify` call
pub struct DeliveryReport<P: ?Sized + 'static = str> {
    /// Subscribers that were live when the round started
    pub attempted: usize,
    /// Subscribers whose `receive` returned `Ok`
    pub delivered: usize,
    /// Registered entries skipped because their owner had dropped them
    pub expired: usize,
    /// Failures in registration order
    pub failures: Vec<DeliveryFailure<P>>,
}

impl<P: ?Sized + 'static> DeliveryReport<P> {
    pub(crate) fn empty(expired: usize) -> Self {
        Self {
            attempted: 0,
            delivered: 0,
            expired,
            failures: Vec::new(),
        }
    }

    /// Every attempted subscriber accepted the payload
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Convert into an error if any subscriber failed
    pub fn into_result(self) -> BroadcastResult<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        let failed = self.failures.iter().map(ToString::to_string).collect();
        Err(BroadcastError::partial_delivery(self.attempted, failed))
    }
}

impl<P: ?Sized + 'static> fmt::Debug for DeliveryReport<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryReport")
            .field("attempted", &self.attempted)
            .field("delivered", &self.delivered)
            .field("expired", &self.expired)
            .field("failures", &self.failures)
            .finish()
    }
}

/// Cumulative delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Notification rounds started
    pub rounds: u64,
    /// Successful `receive` calls
    pub deliveries: u64,
    /// Failed or panicked `receive` calls
    pub failures: u64,
    /// Expired entries skipped during rounds
    pub expired_skips: u64,
}

impl DeliveryStats {
    pub(crate) fn record<P: ?Sized + 'static>(&mut self, report: &DeliveryReport<P>) {
        self.rounds += 1;
        self.deliveries += report.delivered as u64;
        self.failures += report.failures.len() as u64;
        self.expired_skips += report.expired as u64;
    }
}
