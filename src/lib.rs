//! fanout: an in-process publish/notify broadcaster
//!
//! The [`broadcast`] module is the library proper. [`cli`], [`config`] and
//! [`logging`] back the `fanout` demo binary.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod logging;

pub use broadcast::{
    BroadcastError, Broadcaster, BroadcasterConfig, DeliveryError, DeliveryReport, DeliveryStats,
    DispatchMode, Subscriber,
};
