//! Built-in Subscribers
//!
//! Ready-made listener variants. Each is generic over the payload type so the
//! same listener can be registered with broadcasters of different payloads.
//!
//! - [`LogSubscriber`] writes payloads through the `log` facade
//! - [`MetricsSubscriber`] counts payloads and remembers when the last one arrived
//! - [`RecordingSubscriber`] keeps every payload it receives, in order
//! - [`FnSubscriber`] wraps a closure

use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::Level;
use parking_lot::Mutex;
use serde::Serialize;

use crate::broadcast::traits::Subscriber;

/// Writes each payload to the log at a fixed level
#[derive(Debug, Clone)]
pub struct LogSubscriber {
    name: String,
    level: Level,
}

impl LogSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: Level::Info,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl<P: ?Sized + Display> Subscriber<P> for LogSubscriber {
    fn receive(&self, payload: &P) -> anyhow::Result<()> {
        log::log!(self.level, "[{}] {}", self.name, payload);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Point-in-time view of a [`MetricsSubscriber`]
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberMetrics {
    pub name: String,
    pub received: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_received_at: Option<DateTime<Local>>,
}

/// Counts payloads without looking at them
#[derive(Debug)]
pub struct MetricsSubscriber {
    name: String,
    received: AtomicU64,
    last_received_at: Mutex<Option<DateTime<Local>>>,
}

impl MetricsSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: AtomicU64::new(0),
            last_received_at: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SubscriberMetrics {
        SubscriberMetrics {
            name: self.name.clone(),
            received: self.received(),
            last_received_at: *self.last_received_at.lock(),
        }
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        *self.last_received_at.lock() = None;
    }
}

impl<P: ?Sized> Subscriber<P> for MetricsSubscriber {
    fn receive(&self, _payload: &P) -> anyhow::Result<()> {
        self.received.fetch_add(1, Ordering::Relaxed);
        *self.last_received_at.lock() = Some(Local::now());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Keeps the text of every payload it receives
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    name: String,
    received: Mutex<Vec<String>>,
}

impl RecordingSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }
}

impl<P: ?Sized + Display> Subscriber<P> for RecordingSubscriber {
    fn receive(&self, payload: &P) -> anyhow::Result<()> {
        self.received.lock().push(payload.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapts a named closure into a subscriber
///
/// ```
/// use fanout::broadcast::{Broadcaster, FnSubscriber};
///
/// let printer = FnSubscriber::arc("printer", |message: &str| -> anyhow::Result<()> {
///     println!("printer: {}", message);
///     Ok(())
/// });
/// let broadcaster = Broadcaster::new();
/// broadcaster.register(&printer);
/// broadcaster.notify("hello");
/// ```
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    pub fn arc(name: impl Into<String>, handler: F) -> Arc<Self> {
        Arc::new(Self::new(name, handler))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnSubscriber<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubscriber").field("name", &self.name).finish()
    }
}

impl<P, F> Subscriber<P> for FnSubscriber<F>
where
    P: ?Sized,
    F: Fn(&P) -> anyhow::Result<()> + Send + Sync,
{
    fn receive(&self, payload: &P) -> anyhow::Result<()> {
        (self.handler)(payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
