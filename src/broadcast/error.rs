//! Broadcast Error Types
//!
//! Errors describing why a single delivery, or a whole notification round, did
//! not complete cleanly. Removing an unknown subscriber is not an error and has
//! no variant here.

use thiserror::Error;

/// Result type for broadcaster operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Why one subscriber did not accept a payload
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// `receive` returned an error
    #[error("subscriber returned an error: {0:#}")]
    Failed(anyhow::Error),

    /// `receive` panicked; the panic was caught and the round continued
    #[error("subscriber panicked: {message}")]
    Panicked { message: String },
}

impl DeliveryError {
    /// Build a panic error from the payload handed back by `catch_unwind`
    pub fn from_panic(panic: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(msg) = panic.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = panic.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panicked { message }
    }

    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Failed(_) => "delivery_failed",
            DeliveryError::Panicked { .. } => "delivery_panicked",
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, DeliveryError::Panicked { .. })
    }
}

/// Errors surfaced by checked broadcaster operations
#[derive(Debug, Error, Clone)]
pub enum BroadcastError {
    /// At least one subscriber failed during a notification round
    #[error("{} of {attempted} subscribers failed: {}", .failed.len(), .failed.join(", "))]
    PartialDelivery {
        /// Number of subscribers the round attempted
        attempted: usize,
        /// `name: error` for each failed subscriber, in registration order
        failed: Vec<String>,
    },
}

impl BroadcastError {
    pub fn partial_delivery(attempted: usize, failed: Vec<String>) -> Self {
        Self::PartialDelivery { attempted, failed }
    }
}
