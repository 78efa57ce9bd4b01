//! Sequential bulk verification.
//!
//! Items run one at a time with a throttle between them so the upstream
//! providers see a bounded request rate. A bad item never aborts the
//! run: every failure is counted and the loop moves on. Progress is
//! flushed to the batch header every few items, so an observer polling
//! the header sees the run advance.

use crate::adapter::{DocumentType, Inputs};
use crate::error::{Error, Result};
use crate::event::GatewayEvent;
use crate::gateway::{Gateway, VerificationRequest};
use crate::types::{new_id, BatchJob, BatchStatus};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const PROGRESS_FLUSH_EVERY: usize = 5;

/// Live tallies of a running batch, shared with the deadline watcher so
/// a cancelled run still reports what it actually did.
#[derive(Debug, Default)]
struct BatchProgress {
    processed: AtomicUsize,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl BatchProgress {
    fn record(&self, ok: bool) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if ok {
            self.successes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.processed.load(Ordering::SeqCst),
            self.successes.load(Ordering::SeqCst),
            self.failures.load(Ordering::SeqCst),
        )
    }
}

/// One item of a bulk submission. The document type arrives as an
/// untrusted string and is validated per item.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Document type label, validated against the supported set.
    pub doc_type: String,
    /// Type-specific inputs. May contain PII.
    pub inputs: Inputs,
}

/// Final tallies of one batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Batch identifier, also set on every record created by the run.
    pub batch_id: String,
    /// Number of items submitted.
    pub total_items: usize,
    /// Items that verified successfully or queued a job.
    pub success_count: usize,
    /// Items that failed for any reason.
    pub failed_count: usize,
}

/// Runs bulk submissions sequentially against the gateway.
pub struct BatchProcessor {
    gateway: Arc<Gateway>,
}

impl BatchProcessor {
    /// Create a processor over a shared gateway.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Run a batch to completion.
    ///
    /// Returns the final tallies. The batch header transitions to
    /// `COMPLETED` only once every item was attempted; a run cut short
    /// by the deadline leaves the header in `PROCESSING` with the
    /// counters it reached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty batch and
    /// [`Error::Timeout`] when the deadline expires before every item
    /// was attempted.
    pub async fn process(
        &self,
        tenant_id: &str,
        user_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<BatchSummary> {
        if items.is_empty() {
            return Err(Error::InvalidInput("batch has no items".to_string()));
        }

        let batch_id = new_id("BATCH");
        let total_items = items.len();
        let store = Arc::clone(self.gateway.store());
        store.insert_batch(BatchJob {
            batch_id: batch_id.clone(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            status: BatchStatus::Processing,
            total_items,
            processed_items: 0,
            success_count: 0,
            failed_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        })?;
        info!(batch_id = %batch_id, total_items, "batch started");
        let _ = self.gateway.events_sender().send(GatewayEvent::BatchStarted {
            batch_id: batch_id.clone(),
            total_items,
        });

        let deadline = self.gateway.config().batch.timeout();
        let progress = BatchProgress::default();
        let run = self.run_items(tenant_id, user_id, &batch_id, items, &progress);

        let Ok((success_count, failed_count)) = tokio::time::timeout(deadline, run).await else {
            // The loop was cancelled mid-item. Flush the live counters
            // and keep the header in PROCESSING: completion means every
            // item was attempted.
            let (processed, successes, failures) = progress.snapshot();
            store.update_batch(&batch_id, |batch| {
                batch.processed_items = processed;
                batch.success_count = successes;
                batch.failed_count = failures;
            })?;
            warn!(batch_id = %batch_id, processed, total_items, "batch deadline expired mid-run");
            let _ = self.gateway.events_sender().send(GatewayEvent::Error {
                message: format!(
                    "batch {batch_id}: deadline expired after {processed} of {total_items} items"
                ),
            });
            return Err(Error::Timeout(format!(
                "batch {batch_id} exceeded its {deadline:?} deadline"
            )));
        };

        store.update_batch(&batch_id, |batch| {
            batch.status = BatchStatus::Completed;
            batch.processed_items = total_items;
            batch.success_count = success_count;
            batch.failed_count = failed_count;
            batch.completed_at = Some(Utc::now());
        })?;
        let _ = self.gateway.events_sender().send(GatewayEvent::BatchCompleted {
            batch_id: batch_id.clone(),
            success_count,
            failed_count,
        });
        info!(batch_id = %batch_id, success_count, failed_count, "batch completed");
        Ok(BatchSummary {
            batch_id,
            total_items,
            success_count,
            failed_count,
        })
    }

    /// The sequential item loop. Returns (successes, failures).
    async fn run_items(
        &self,
        tenant_id: &str,
        user_id: &str,
        batch_id: &str,
        items: Vec<BatchItem>,
        progress: &BatchProgress,
    ) -> (usize, usize) {
        let total = items.len();
        let throttle = self.gateway.config().batch.throttle();

        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(throttle).await;
            }

            let ok = self
                .run_item(tenant_id, user_id, batch_id, item, index)
                .await;
            progress.record(ok);

            let processed = index + 1;
            if processed % PROGRESS_FLUSH_EVERY == 0 || processed == total {
                let (_, successes, failures) = progress.snapshot();
                let flush = self.gateway.store().update_batch(batch_id, |batch| {
                    batch.processed_items = processed;
                    batch.success_count = successes;
                    batch.failed_count = failures;
                });
                if let Err(e) = flush {
                    warn!(batch_id = %batch_id, error = %e, "failed to flush batch progress");
                    let _ = self.gateway.events_sender().send(GatewayEvent::Error {
                        message: format!("batch {batch_id}: progress flush failed: {e}"),
                    });
                }
            }
        }
        let (_, successes, failures) = progress.snapshot();
        (successes, failures)
    }

    /// Run a single item. Every failure mode maps to `false`.
    async fn run_item(
        &self,
        tenant_id: &str,
        user_id: &str,
        batch_id: &str,
        item: BatchItem,
        index: usize,
    ) -> bool {
        let doc_type: DocumentType = match item.doc_type.parse() {
            Ok(doc_type) => doc_type,
            Err(e) => {
                warn!(batch_id = %batch_id, index, error = %e, "batch item skipped");
                return false;
            }
        };
        let request = VerificationRequest {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            doc_type,
            inputs: item.inputs,
            batch_id: Some(batch_id.to_string()),
        };
        match self.gateway.verify(request).await {
            Ok(outcome) => outcome.result.is_valid || outcome.job_id.is_some(),
            Err(e) => {
                warn!(batch_id = %batch_id, index, error = %e, "batch item failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    fn fast_gateway() -> Arc<Gateway> {
        let mut config = GatewayConfig::default();
        config.batch.throttle_ms = 0;
        Arc::new(Gateway::builder(config).build().expect("gateway"))
    }

    fn item(doc_type: &str, name: &str) -> BatchItem {
        let mut inputs = Inputs::new();
        inputs.insert("name".to_string(), name.to_string());
        inputs.insert("address".to_string(), "14 Lake Road, Pune".to_string());
        BatchItem {
            doc_type: doc_type.to_string(),
            inputs,
        }
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let processor = BatchProcessor::new(fast_gateway());
        let err = processor.process("t1", "u1", Vec::new()).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn bad_items_are_counted_not_fatal() {
        let gateway = fast_gateway();
        gateway.top_up("t1", 1000).expect("top-up");
        let processor = BatchProcessor::new(Arc::clone(&gateway));

        // Unknown type, unfunded later tenant items still count toward
        // the totals; the async type queues a job and counts as success.
        let items = vec![
            item("NO_SUCH_TYPE", "Asha Rao"),
            item("BACKGROUND_CHECK", "Asha Rao"),
        ];
        let summary = processor.process("t1", "u1", items).await.expect("batch");
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failed_count, 1);

        let header = gateway.store().batch(&summary.batch_id).expect("header");
        assert_eq!(header.status, BatchStatus::Completed);
        assert_eq!(header.processed_items, 2);
        assert!(header.completed_at.is_some());
    }

    #[tokio::test]
    async fn deadline_expiry_leaves_header_processing_with_live_counters() {
        let mut config = GatewayConfig::default();
        config.batch.throttle_ms = 50;
        config.batch.timeout_secs = 0;
        let gateway = Arc::new(Gateway::builder(config).build().expect("gateway"));
        gateway.top_up("t1", 300).expect("top-up");
        let mut events = gateway.subscribe();
        let processor = BatchProcessor::new(Arc::clone(&gateway));

        // The deadline elapses while the second item waits on the
        // throttle, so exactly one item gets attempted.
        let items = vec![
            item("BACKGROUND_CHECK", "Asha Rao"),
            item("BACKGROUND_CHECK", "Ravi Iyer"),
            item("BACKGROUND_CHECK", "Mira Shah"),
        ];
        let err = processor.process("t1", "u1", items).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        let batch_id = match events.recv().await.expect("event") {
            GatewayEvent::BatchStarted { batch_id, .. } => batch_id,
            other => panic!("unexpected first event: {other:?}"),
        };
        let header = gateway.store().batch(&batch_id).expect("header");
        assert_eq!(header.status, BatchStatus::Processing);
        assert_eq!(header.processed_items, 1);
        assert_eq!(header.success_count, 1);
        assert_eq!(header.failed_count, 0);
        assert!(header.completed_at.is_none());
    }

    #[tokio::test]
    async fn insufficient_balance_fails_items_without_aborting() {
        let gateway = fast_gateway();
        // 2 * 99 funds exactly two background checks out of three.
        gateway.top_up("t1", 198).expect("top-up");
        let processor = BatchProcessor::new(Arc::clone(&gateway));

        let items = vec![
            item("BACKGROUND_CHECK", "Asha Rao"),
            item("BACKGROUND_CHECK", "Ravi Iyer"),
            item("BACKGROUND_CHECK", "Mira Shah"),
        ];
        let summary = processor.process("t1", "u1", items).await.expect("batch");
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(gateway.balance("t1"), 0);
    }
}
