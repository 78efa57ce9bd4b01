//! Domain records persisted by the gateway, batch processor and worker.
//!
//! All three record families are append-once: a `VerificationRecord` is
//! immutable after creation, a `VerificationJob` makes exactly one
//! transition out of `Pending`, and a `BatchJob` only ever moves its
//! progress counters forward.

use crate::adapter::{DocumentType, Inputs, StandardResult};
use crate::mask::mask_inputs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal status of a completed verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// The provider confirmed the document.
    Valid,
    /// The provider rejected the document or the call failed.
    Failed,
}

/// Lifecycle of an asynchronous verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, awaiting the background worker.
    Pending,
    /// Worker found no adverse records.
    Verified,
    /// Worker found adverse records or failed terminally.
    Rejected,
}

impl JobStatus {
    /// True once the job has left `Pending`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Lifecycle of a batch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Items are still being attempted.
    Processing,
    /// Every item has been attempted.
    Completed,
}

/// Audit record for one completed or dispatched verification attempt.
///
/// This is the single source of truth consumed by certificates and
/// dashboards. Inputs are stored raw for audit; [`Self::masked`] must be
/// applied before the record crosses the gateway boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Unique record id.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// User who requested the verification.
    pub user_id: String,
    /// Document type that was verified.
    pub doc_type: DocumentType,
    /// Caller-supplied inputs. May contain PII.
    pub inputs: Inputs,
    /// Normalized provider outcome.
    pub result: StandardResult,
    /// Terminal status derived from the result.
    pub status: VerificationStatus,
    /// Human-readable label of the authority that answered.
    pub source_authority: String,
    /// When the attempt completed.
    pub timestamp: DateTime<Utc>,
    /// Batch this record belongs to, if any.
    pub batch_id: Option<String>,
}

impl VerificationRecord {
    /// Copy of the record safe for external exposure: inputs masked and
    /// the raw provider payload removed.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.inputs = mask_inputs(&self.inputs);
        copy.result = self.result.redacted();
        copy
    }
}

/// A deferred verification awaiting out-of-band completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationJob {
    /// Unique job id.
    pub job_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Document type under verification.
    pub doc_type: DocumentType,
    /// Caller-supplied inputs. May contain PII.
    pub inputs: Inputs,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Human-readable outcome, set on completion.
    pub result: Option<String>,
}

/// Progress header for a bulk submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Unique batch id.
    pub batch_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// User who submitted the batch.
    pub user_id: String,
    /// Current lifecycle status.
    pub status: BatchStatus,
    /// Number of items submitted.
    pub total_items: usize,
    /// Items attempted so far. Monotonically non-decreasing.
    pub processed_items: usize,
    /// Items that verified successfully or dispatched a job.
    pub success_count: usize,
    /// Items that failed for any reason.
    pub failed_count: usize,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch completed.
    pub completed_at: Option<DateTime<Utc>>,
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique, time-ordered identifier.
///
/// Format: `{PREFIX}_{unix_millis}_{sequence}`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{seq}", Utc::now().timestamp_millis())
}
