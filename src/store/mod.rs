//! In-memory document store backing the gateway.
//!
//! Stands in for a document database offering serializable transactions
//! on a per-tenant key. Wallet mutations run under a single mutex so a
//! debit's read-check-write-append is one atomic unit with no lost
//! updates under concurrent debits; record, job and batch writes are each
//! scoped to their own document.

use crate::billing::{Transaction, Wallet};
use crate::error::{Error, Result};
use crate::types::{BatchJob, JobStatus, VerificationJob, VerificationRecord};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// A tenant wallet together with its append-only transaction log.
///
/// Stored as one unit so the balance and its log always change together.
#[derive(Debug, Clone)]
pub struct WalletDoc {
    /// The wallet itself.
    pub wallet: Wallet,
    /// Append-only transaction log.
    pub transactions: Vec<Transaction>,
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    wallets: Mutex<HashMap<String, WalletDoc>>,
    verifications: RwLock<HashMap<String, VerificationRecord>>,
    jobs: RwLock<HashMap<String, VerificationJob>>,
    batches: RwLock<HashMap<String, BatchJob>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a serializable transaction over one tenant's wallet document.
    ///
    /// If the wallet does not exist it is initialized via `init` before
    /// the closure runs; `created` tells the closure so. When the closure
    /// fails, mutations are rolled back - except the initialization of a
    /// freshly created wallet, which persists (first-call-creates
    /// semantics for the billing ledger).
    ///
    /// # Errors
    ///
    /// Propagates the closure's error after rolling back.
    pub fn wallet_transaction<T>(
        &self,
        tenant_id: &str,
        init: impl FnOnce() -> Wallet,
        f: impl FnOnce(&mut WalletDoc, bool) -> Result<T>,
    ) -> Result<T> {
        let mut wallets = self.wallets.lock();
        let created = !wallets.contains_key(tenant_id);
        let doc = wallets
            .entry(tenant_id.to_string())
            .or_insert_with(|| WalletDoc {
                wallet: init(),
                transactions: Vec::new(),
            });
        let snapshot = doc.clone();

        match f(doc, created) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Roll back the closure's mutations; the created wallet
                // itself stays.
                *doc = snapshot;
                Err(e)
            }
        }
    }

    /// Point read of a tenant's wallet.
    #[must_use]
    pub fn wallet(&self, tenant_id: &str) -> Option<Wallet> {
        self.wallets.lock().get(tenant_id).map(|d| d.wallet.clone())
    }

    /// The tenant's transaction log, oldest first.
    #[must_use]
    pub fn transactions(&self, tenant_id: &str) -> Vec<Transaction> {
        self.wallets
            .lock()
            .get(tenant_id)
            .map(|d| d.transactions.clone())
            .unwrap_or_default()
    }

    /// Persist a verification record. Records are immutable once written.
    ///
    /// # Errors
    ///
    /// Returns an error if a record with the same id already exists.
    pub fn insert_verification(&self, record: VerificationRecord) -> Result<()> {
        let mut records = self.verifications.write();
        if records.contains_key(&record.id) {
            return Err(Error::Storage(format!(
                "verification {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Point read of a verification record.
    #[must_use]
    pub fn verification(&self, id: &str) -> Option<VerificationRecord> {
        self.verifications.read().get(id).cloned()
    }

    /// All records for a tenant, unordered.
    #[must_use]
    pub fn verifications_for_tenant(&self, tenant_id: &str) -> Vec<VerificationRecord> {
        self.verifications
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Persist a newly created verification job.
    ///
    /// # Errors
    ///
    /// Returns an error if a job with the same id already exists.
    pub fn insert_job(&self, job: VerificationJob) -> Result<()> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.job_id) {
            return Err(Error::Storage(format!("job {} already exists", job.job_id)));
        }
        jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    /// Point read of a verification job.
    #[must_use]
    pub fn job(&self, job_id: &str) -> Option<VerificationJob> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Atomically move a job from PENDING to a terminal status.
    ///
    /// Compare-and-set on the current status: returns `Ok(true)` when the
    /// transition happened, `Ok(false)` when the job was already terminal
    /// (duplicate trigger - a no-op by design).
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or `status` is not
    /// terminal.
    pub fn complete_job(
        &self,
        job_id: &str,
        status: JobStatus,
        result: String,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        if !status.is_terminal() {
            return Err(Error::Storage(format!(
                "job {job_id}: {status:?} is not a terminal status"
            )));
        }
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::Storage(format!("job {job_id} not found")))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = status;
        job.result = Some(result);
        job.completed_at = Some(completed_at);
        Ok(true)
    }

    /// Ids of jobs still PENDING that were created before the cutoff.
    #[must_use]
    pub fn pending_jobs_created_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.jobs
            .read()
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.created_at < cutoff)
            .map(|j| j.job_id.clone())
            .collect()
    }

    /// Persist a batch header.
    ///
    /// # Errors
    ///
    /// Returns an error if a batch with the same id already exists.
    pub fn insert_batch(&self, batch: BatchJob) -> Result<()> {
        let mut batches = self.batches.write();
        if batches.contains_key(&batch.batch_id) {
            return Err(Error::Storage(format!(
                "batch {} already exists",
                batch.batch_id
            )));
        }
        batches.insert(batch.batch_id.clone(), batch);
        Ok(())
    }

    /// Point read of a batch header.
    #[must_use]
    pub fn batch(&self, batch_id: &str) -> Option<BatchJob> {
        self.batches.read().get(batch_id).cloned()
    }

    /// Atomically update a batch header in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch does not exist.
    pub fn update_batch(&self, batch_id: &str, f: impl FnOnce(&mut BatchJob)) -> Result<()> {
        let mut batches = self.batches.write();
        let batch = batches
            .get_mut(batch_id)
            .ok_or_else(|| Error::Storage(format!("batch {batch_id} not found")))?;
        f(batch);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adapter::{DocumentType, Inputs};
    use crate::billing::TransactionKind;
    use crate::types::new_id;

    fn wallet(tenant: &str, balance: i64) -> Wallet {
        Wallet {
            tenant_id: tenant.to_string(),
            balance,
            currency: "INR".to_string(),
            low_balance_threshold: 0,
            contact_email: None,
            contact_phone: None,
        }
    }

    #[test]
    fn failed_transaction_rolls_back_mutations() {
        let store = MemoryStore::new();
        store
            .wallet_transaction("t1", || wallet("t1", 100), |_, _| Ok(()))
            .expect("seed");

        let result: Result<()> = store.wallet_transaction(
            "t1",
            || wallet("t1", 0),
            |doc, _| {
                doc.wallet.balance = 1;
                doc.transactions.push(Transaction {
                    amount: 99,
                    kind: TransactionKind::Debit,
                    reference_id: "x".to_string(),
                    timestamp: Utc::now(),
                    description: String::new(),
                });
                Err(Error::Storage("abort".to_string()))
            },
        );
        assert!(result.is_err());

        let doc = store.wallet("t1").expect("wallet");
        assert_eq!(doc.balance, 100);
        assert!(store.transactions("t1").is_empty());
    }

    #[test]
    fn created_wallet_persists_even_when_the_closure_fails() {
        let store = MemoryStore::new();
        let result: Result<()> = store.wallet_transaction(
            "t2",
            || wallet("t2", 0),
            |_, created| {
                assert!(created);
                Err(Error::InsufficientBalance {
                    required: 99,
                    available: 0,
                })
            },
        );
        assert!(result.is_err());
        assert_eq!(store.wallet("t2").expect("wallet").balance, 0);
    }

    fn pending_job(job_id: &str) -> VerificationJob {
        VerificationJob {
            job_id: job_id.to_string(),
            tenant_id: "t1".to_string(),
            doc_type: DocumentType::BackgroundCheck,
            inputs: Inputs::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        }
    }

    #[test]
    fn complete_job_is_a_compare_and_set() {
        let store = MemoryStore::new();
        store.insert_job(pending_job("JOB_1")).expect("insert");

        let first = store
            .complete_job("JOB_1", JobStatus::Verified, "clear".to_string(), Utc::now())
            .expect("first");
        assert!(first);

        let second = store
            .complete_job("JOB_1", JobStatus::Rejected, "dup".to_string(), Utc::now())
            .expect("second");
        assert!(!second);

        let job = store.job("JOB_1").expect("job");
        assert_eq!(job.status, JobStatus::Verified);
        assert_eq!(job.result.as_deref(), Some("clear"));
    }

    #[test]
    fn complete_job_rejects_non_terminal_status() {
        let store = MemoryStore::new();
        store.insert_job(pending_job("JOB_2")).expect("insert");
        let result = store.complete_job("JOB_2", JobStatus::Pending, String::new(), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_verification_ids_are_rejected() {
        let store = MemoryStore::new();
        let id = new_id("VRF");
        let record = VerificationRecord {
            id: id.clone(),
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
            doc_type: DocumentType::TaxId,
            inputs: Inputs::new(),
            result: crate::adapter::StandardResult::failure("x", serde_json::Value::Null),
            status: crate::types::VerificationStatus::Failed,
            source_authority: "test".to_string(),
            timestamp: Utc::now(),
            batch_id: None,
        };
        store.insert_verification(record.clone()).expect("first");
        assert!(store.insert_verification(record).is_err());
        assert!(store.verification(&id).is_some());
    }
}
