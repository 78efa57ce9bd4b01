//! Asynchronous job worker for long-running checks.
//!
//! Jobs are processed in detached tasks and completed through a
//! compare-and-set transition, so a duplicate delivery of the same job
//! id settles it exactly once.

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::event::{GatewayEvent, GatewayEventsSender};
use crate::notify::Notifier;
use crate::store::MemoryStore;
use crate::types::JobStatus;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REJECTED_RESULT: &str = "Clear match found in court records for economic offense.";
const VERIFIED_RESULT: &str = "No adverse records found in district court database.";
const STALE_RESULT: &str = "Check expired before a result was available.";

/// Processes queued background-check jobs to a terminal status.
#[derive(Clone)]
pub struct JobWorker {
    store: Arc<MemoryStore>,
    notifier: Arc<Notifier>,
    events: GatewayEventsSender,
    processing_delay: Duration,
    stale_after: ChronoDuration,
}

impl JobWorker {
    /// Create a worker over the shared store.
    #[must_use]
    pub fn new(
        store: Arc<MemoryStore>,
        notifier: Arc<Notifier>,
        events: GatewayEventsSender,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            events,
            processing_delay: config.processing_delay(),
            stale_after: ChronoDuration::hours(
                i64::try_from(config.stale_after_hours).unwrap_or(i64::MAX),
            ),
        }
    }

    /// Run one job to completion.
    ///
    /// Safe to call more than once for the same id: an already-terminal
    /// job is left untouched and the call returns without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the job does not exist.
    pub async fn process(&self, job_id: &str) -> Result<()> {
        let job = self
            .store
            .job(job_id)
            .ok_or_else(|| Error::Storage(format!("job {job_id} not found")))?;
        if job.status.is_terminal() {
            debug!(job_id, status = ?job.status, "job already settled, skipping");
            return Ok(());
        }

        info!(job_id, tenant_id = %job.tenant_id, "processing background check");
        tokio::time::sleep(self.processing_delay).await;

        let name = job.inputs.get("name").map(String::as_str).unwrap_or("");
        let address = job.inputs.get("address").map(String::as_str).unwrap_or("");
        let adverse = name.to_lowercase().contains("fraud")
            || address.to_lowercase().contains("fake");
        let (status, result) = if adverse {
            (JobStatus::Rejected, REJECTED_RESULT)
        } else {
            (JobStatus::Verified, VERIFIED_RESULT)
        };

        let settled = self
            .store
            .complete_job(job_id, status, result.to_string(), Utc::now())?;
        if !settled {
            debug!(job_id, "job was settled concurrently, dropping duplicate result");
            return Ok(());
        }

        info!(job_id, ?status, "background check settled");
        let _ = self.events.send(GatewayEvent::JobCompleted {
            job_id: job_id.to_string(),
            status,
        });

        if status == JobStatus::Rejected {
            let contacts = self
                .store
                .wallet(&job.tenant_id)
                .map(|w| (w.contact_email, w.contact_phone))
                .unwrap_or((None, None));
            self.notifier.spawn_rejection_alert(
                contacts.0,
                contacts.1,
                name.to_string(),
                result.to_string(),
            );
        }
        Ok(())
    }

    /// Settle every job still pending past the staleness horizon.
    ///
    /// Returns the ids that were transitioned by this sweep.
    pub fn sweep_stale(&self) -> Vec<String> {
        let cutoff = Utc::now() - self.stale_after;
        let mut swept = Vec::new();
        for job_id in self.store.pending_jobs_created_before(cutoff) {
            match self
                .store
                .complete_job(&job_id, JobStatus::Rejected, STALE_RESULT.to_string(), Utc::now())
            {
                Ok(true) => {
                    warn!(job_id, "stale pending job swept to rejected");
                    let _ = self.events.send(GatewayEvent::JobCompleted {
                        job_id: job_id.clone(),
                        status: JobStatus::Rejected,
                    });
                    swept.push(job_id);
                }
                Ok(false) => {}
                Err(e) => warn!(job_id, error = %e, "failed to sweep stale job"),
            }
        }
        swept
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adapter::{DocumentType, Inputs};
    use crate::config::NotifyConfig;
    use crate::event::create_event_channel;
    use crate::types::{new_id, VerificationJob};

    fn worker(store: Arc<MemoryStore>) -> JobWorker {
        let notifier = Arc::new(Notifier::new(NotifyConfig::default()).expect("notifier"));
        let (events, _rx) = create_event_channel();
        let config = WorkerConfig {
            processing_delay_secs: 0,
            stale_after_hours: 24,
        };
        JobWorker::new(store, notifier, events, &config)
    }

    fn seed_job_at(
        store: &MemoryStore,
        name: &str,
        address: &str,
        created_at: chrono::DateTime<Utc>,
    ) -> String {
        let mut inputs = Inputs::new();
        inputs.insert("name".to_string(), name.to_string());
        inputs.insert("address".to_string(), address.to_string());
        let job_id = new_id("JOB");
        store
            .insert_job(VerificationJob {
                job_id: job_id.clone(),
                tenant_id: "t1".to_string(),
                doc_type: DocumentType::BackgroundCheck,
                inputs,
                status: JobStatus::Pending,
                created_at,
                completed_at: None,
                result: None,
            })
            .expect("insert job");
        job_id
    }

    fn seed_job(store: &MemoryStore, name: &str, address: &str) -> String {
        seed_job_at(store, name, address, Utc::now())
    }

    #[tokio::test]
    async fn clean_subject_verifies() {
        let store = Arc::new(MemoryStore::new());
        let job_id = seed_job(&store, "Asha Rao", "14 Lake Road, Pune");
        worker(Arc::clone(&store)).process(&job_id).await.expect("process");

        let job = store.job(&job_id).expect("job");
        assert_eq!(job.status, JobStatus::Verified);
        assert_eq!(job.result.as_deref(), Some(VERIFIED_RESULT));
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn adverse_name_rejects() {
        let store = Arc::new(MemoryStore::new());
        let job_id = seed_job(&store, "Fraud Kumar", "14 Lake Road, Pune");
        worker(Arc::clone(&store)).process(&job_id).await.expect("process");

        assert_eq!(store.job(&job_id).expect("job").status, JobStatus::Rejected);
    }

    #[tokio::test]
    async fn adverse_address_rejects_case_insensitively() {
        let store = Arc::new(MemoryStore::new());
        let job_id = seed_job(&store, "Asha Rao", "99 FAKE Street");
        worker(Arc::clone(&store)).process(&job_id).await.expect("process");

        assert_eq!(store.job(&job_id).expect("job").status, JobStatus::Rejected);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let job_id = seed_job(&store, "Asha Rao", "14 Lake Road, Pune");
        let worker = worker(Arc::clone(&store));

        worker.process(&job_id).await.expect("first delivery");
        let first = store.job(&job_id).expect("job");
        worker.process(&job_id).await.expect("second delivery");
        let second = store.job(&job_id).expect("job");

        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(first.result, second.result);
    }

    #[tokio::test]
    async fn missing_job_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let err = worker(store).process("JOB_missing").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn sweep_rejects_only_stale_pending_jobs() {
        let store = Arc::new(MemoryStore::new());
        let stale_id = seed_job_at(
            &store,
            "Asha Rao",
            "14 Lake Road, Pune",
            Utc::now() - ChronoDuration::hours(48),
        );
        let fresh_id = seed_job(&store, "Ravi Iyer", "2 Hill View, Chennai");

        let swept = worker(Arc::clone(&store)).sweep_stale();
        assert_eq!(swept, vec![stale_id.clone()]);
        assert_eq!(store.job(&stale_id).expect("job").status, JobStatus::Rejected);
        assert_eq!(store.job(&fresh_id).expect("job").status, JobStatus::Pending);
    }
}
