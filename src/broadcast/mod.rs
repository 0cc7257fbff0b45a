//! In-process Publish/Notify Broadcaster
//!
//! A [`Broadcaster`] keeps an ordered list of [`Subscriber`]s and hands a
//! payload to each of them, synchronously, whenever `notify` is called.
//!
//! # Architecture
//!
//! ```text
//! notify(payload)
//!     │
//!     ├─ read lock ─► snapshot live subscribers ─► release lock
//!     │
//!     ├──► subscriber 1.receive(payload) ──► Ok / Err / panic (caught)
//!     ├──► subscriber 2.receive(payload) ──► ...
//!     └──► subscriber N.receive(payload)
//!              │
//!              ▼
//!        DeliveryReport { delivered, failures, expired }
//! ```
//!
//! - **Subscribers**: any type implementing [`Subscriber`]; built-in variants in [`subscribers`]
//! - **Broadcaster**: registration, removal and fan-out
//! - **Reports**: per-round [`DeliveryReport`] and cumulative [`DeliveryStats`]
//!
//! # Example Usage
//!
//! ```
//! use fanout::broadcast::{Broadcaster, RecordingSubscriber};
//! use std::sync::Arc;
//!
//! let first = Arc::new(RecordingSubscriber::new("Observer1"));
//! let second = Arc::new(RecordingSubscriber::new("Observer2"));
//!
//! let broadcaster = Broadcaster::new();
//! broadcaster.register(&first);
//! broadcaster.register(&second);
//!
//! let report = broadcaster.notify("hello");
//! assert_eq!(report.delivered, 2);
//! assert_eq!(first.received(), vec!["hello"]);
//! assert_eq!(second.received(), vec!["hello"]);
//! ```

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod report;
pub mod subscribers;
pub mod traits;


// Re-export core types for convenience
pub use broadcaster::Broadcaster;
pub use config::{BroadcasterConfig, DispatchMode};
pub use error::{BroadcastError, BroadcastResult, DeliveryError};
pub use report::{DeliveryFailure, DeliveryReport, DeliveryStats};
pub use subscribers::{FnSubscriber, LogSubscriber, MetricsSubscriber, RecordingSubscriber, SubscriberMetrics};
pub use traits::Subscriber;
