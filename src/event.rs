//! Gateway event system.

use crate::types::{JobStatus, VerificationStatus};
use tokio::sync::broadcast;

/// Events emitted by the gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A synchronous verification finished and its record was persisted.
    VerificationCompleted {
        /// Verification record identifier.
        verification_id: String,
        /// Owning tenant.
        tenant_id: String,
        /// Final status of the check.
        status: VerificationStatus,
    },

    /// An asynchronous job was accepted and queued.
    JobCreated {
        /// Job identifier.
        job_id: String,
        /// Owning tenant.
        tenant_id: String,
    },

    /// An asynchronous job reached a terminal status.
    JobCompleted {
        /// Job identifier.
        job_id: String,
        /// Terminal status.
        status: JobStatus,
    },

    /// A batch run started.
    BatchStarted {
        /// Batch identifier.
        batch_id: String,
        /// Number of items in the batch.
        total_items: usize,
    },

    /// A batch run finished.
    BatchCompleted {
        /// Batch identifier.
        batch_id: String,
        /// Items that verified successfully or were queued.
        success_count: usize,
        /// Items that failed.
        failed_count: usize,
    },

    /// A tenant wallet crossed its low-balance threshold.
    LowBalance {
        /// Owning tenant.
        tenant_id: String,
        /// Balance after the triggering debit.
        balance: i64,
    },

    /// The circuit breaker rejected a call without reaching the provider.
    BreakerOpen {
        /// Document type whose call was rejected.
        doc_type: String,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving gateway events.
pub type GatewayEventsChannel = broadcast::Receiver<GatewayEvent>;

/// Sender for gateway events.
pub type GatewayEventsSender = broadcast::Sender<GatewayEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GatewayEventsSender, GatewayEventsChannel) {
    broadcast::channel(256)
}
