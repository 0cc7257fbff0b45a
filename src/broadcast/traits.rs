//! Subscriber Capability
//!
//! The single behavioural contract every listener implements. The broadcaster
//! only ever sees `dyn Subscriber<P>`, so any number of concrete variants can
//! be registered side by side.

/// A listener that receives payloads from a [`Broadcaster`](crate::broadcast::Broadcaster).
///
/// `P` is the payload type and defaults to `str`, so the common case of a text
/// message reads as `impl Subscriber for MyListener`.
///
/// `receive` is called synchronously from `notify`. Returning an error (or
/// panicking) only affects this subscriber's entry in the delivery report;
/// delivery to later subscribers continues.
///
/// # Example
///
/// ```
/// use fanout::broadcast::{Broadcaster, Subscriber};
/// use std::sync::Arc;
///
/// struct Shout;
///
/// impl Subscriber for Shout {
///     fn receive(&self, payload: &str) -> anyhow::Result<()> {
///         println!("{}", payload.to_uppercase());
///         Ok(())
///     }
/// }
///
/// let shout = Arc::new(Shout);
/// let broadcaster = Broadcaster::new();
/// broadcaster.register(&shout);
/// assert!(broadcaster.notify("hello").is_complete());
/// ```
pub trait Subscriber<P: ?Sized = str>: Send + Sync {
    /// Handle one payload
    fn receive(&self, payload: &P) -> anyhow::Result<()>;

    /// Name used in logs and failure reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
