//! Error types for veridesk.
//!
//! The taxonomy mirrors how callers must react: client errors are never
//! billed, billing errors never reach a provider, transient provider errors
//! are retried and then folded into a structured result, and an open
//! circuit is distinguishable from a genuine provider rejection.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in veridesk.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown document type requested by the caller.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    /// Malformed caller-supplied inputs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tenant wallet cannot cover the requested cost.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Cost of the attempted operation in minor currency units.
        required: i64,
        /// Balance available at the time of the attempt.
        available: i64,
    },

    /// Provider call failed after the retry budget was exhausted.
    #[error("provider call failed: {0}")]
    Provider(String),

    /// The circuit breaker is open; no call was made.
    #[error("SERVICE_TEMPORARILY_UNAVAILABLE: the circuit breaker is open")]
    CircuitOpen,

    /// An operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Document store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Notification delivery error. Always swallowed at the call site.
    #[error("notification error: {0}")]
    Notification(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True for caller mistakes (4xx-equivalent). These never charge the
    /// tenant and never reach a provider.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedType(_) | Self::InvalidInput(_))
    }

    /// True for billing rejections, surfaced with a distinct code so the
    /// caller can prompt a top-up.
    #[must_use]
    pub fn is_billing_error(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
    }

    /// True when the failure is a degraded-service signal rather than a
    /// verdict about the document under verification.
    #[must_use]
    pub fn is_service_degraded(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::Timeout(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint() {
        let client = Error::UnsupportedType("PASSPORT".into());
        assert!(client.is_client_error());
        assert!(!client.is_billing_error());

        let billing = Error::InsufficientBalance {
            required: 99,
            available: 2,
        };
        assert!(billing.is_billing_error());
        assert!(!billing.is_client_error());

        assert!(Error::CircuitOpen.is_service_degraded());
        assert!(!Error::Provider("boom".into()).is_service_degraded());
    }

    #[test]
    fn circuit_open_message_is_distinguishable() {
        let msg = Error::CircuitOpen.to_string();
        assert!(msg.contains("SERVICE_TEMPORARILY_UNAVAILABLE"));
    }
}
