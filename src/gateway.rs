//! Verification gateway orchestration.
//!
//! One entry point for every document check: debit the tenant wallet,
//! dispatch to the right adapter through the resilient client, persist
//! the outcome, and fan out notifications. The debit always precedes the
//! provider call and is never refunded; a failed check is a consumed
//! attempt.

use crate::adapter::{DocumentType, Inputs, Registry, StandardResult};
use crate::billing::Ledger;
use crate::client::ResilientClient;
use crate::config::{GatewayConfig, ProviderCredentials};
use crate::error::{Error, Result};
use crate::event::{create_event_channel, GatewayEvent, GatewayEventsChannel, GatewayEventsSender};
use crate::mask::mask_inputs;
use crate::notify::Notifier;
use crate::store::MemoryStore;
use crate::types::{new_id, JobStatus, VerificationJob, VerificationRecord, VerificationStatus};
use crate::worker::JobWorker;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One verification request, as received from the outer surface.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Tenant whose wallet funds the check.
    pub tenant_id: String,
    /// User requesting the check.
    pub user_id: String,
    /// Document type to verify.
    pub doc_type: DocumentType,
    /// Type-specific inputs. May contain PII.
    pub inputs: Inputs,
    /// Batch this request belongs to, if any.
    pub batch_id: Option<String>,
}

/// The caller-facing outcome of one verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// Persisted record id for synchronous checks.
    pub verification_id: Option<String>,
    /// Queued job id for asynchronous checks.
    pub job_id: Option<String>,
    /// Normalized result with the raw provider payload removed.
    pub result: StandardResult,
    /// Wallet balance after the debit.
    pub balance: i64,
}

/// Builder for constructing a verification gateway.
pub struct GatewayBuilder {
    config: GatewayConfig,
    credentials: ProviderCredentials,
}

impl GatewayBuilder {
    /// Create a new gateway builder with the given configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            credentials: ProviderCredentials::from_env(),
        }
    }

    /// Override the provider credentials loaded from the environment.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Build the gateway and its shared subsystems.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn build(self) -> Result<Gateway> {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(Notifier::new(self.config.notify.clone())?);
        let registry = Registry::new(&self.config.provider)?;
        let client = ResilientClient::new(
            &self.config.provider,
            self.config.retry.clone(),
            self.config.breaker.clone(),
            self.credentials,
        )?;
        let ledger = Ledger::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            self.config.currency.clone(),
        );
        let (events, _rx) = create_event_channel();
        let worker = JobWorker::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            events.clone(),
            &self.config.worker,
        );
        Ok(Gateway {
            config: self.config,
            registry,
            client,
            store,
            ledger,
            notifier,
            worker,
            events,
        })
    }
}

/// The verification gateway. Cheap to share behind an [`Arc`].
pub struct Gateway {
    config: GatewayConfig,
    registry: Registry,
    client: ResilientClient,
    store: Arc<MemoryStore>,
    ledger: Ledger,
    notifier: Arc<Notifier>,
    worker: JobWorker,
    events: GatewayEventsSender,
}

impl Gateway {
    /// Start building a gateway from configuration.
    #[must_use]
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Run one verification end to end.
    ///
    /// Synchronous types return a persisted record id and the redacted
    /// result. Asynchronous types return a job id and a pending result;
    /// the job settles out of band.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientBalance`] when the wallet cannot
    /// cover the cost. Provider failures do not error: they come back as
    /// a result with `is_valid: false`.
    pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationOutcome> {
        info!(
            tenant_id = %request.tenant_id,
            doc_type = %request.doc_type,
            inputs = ?mask_inputs(&request.inputs),
            "verification requested"
        );

        let reference_id = new_id("VRF");
        let balance = self
            .ledger
            .debit(&request.tenant_id, self.config.verification_cost, &reference_id)?;
        if self
            .store
            .wallet(&request.tenant_id)
            .is_some_and(|w| balance <= w.low_balance_threshold)
        {
            let _ = self.events.send(GatewayEvent::LowBalance {
                tenant_id: request.tenant_id.clone(),
                balance,
            });
        }

        if request.doc_type.is_async() {
            return self.start_job(request, balance);
        }

        let result = self.call_provider(request.doc_type, &request.inputs).await;
        let status = if result.is_valid {
            VerificationStatus::Valid
        } else {
            VerificationStatus::Failed
        };
        let source_authority = self
            .registry
            .resolve(request.doc_type)?
            .source_authority()
            .to_string();

        let record = VerificationRecord {
            id: reference_id.clone(),
            tenant_id: request.tenant_id.clone(),
            user_id: request.user_id,
            doc_type: request.doc_type,
            inputs: request.inputs.clone(),
            result: result.clone(),
            status,
            source_authority,
            timestamp: Utc::now(),
            batch_id: request.batch_id,
        };
        self.store.insert_verification(record)?;

        let _ = self.events.send(GatewayEvent::VerificationCompleted {
            verification_id: reference_id.clone(),
            tenant_id: request.tenant_id.clone(),
            status,
        });

        if status == VerificationStatus::Failed {
            warn!(
                verification_id = %reference_id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "verification failed"
            );
            let subject = request
                .inputs
                .get("name")
                .cloned()
                .or_else(|| result.legal_name.clone())
                .unwrap_or_else(|| "the submitted document".to_string());
            let contacts = self
                .store
                .wallet(&request.tenant_id)
                .map(|w| (w.contact_email, w.contact_phone))
                .unwrap_or((None, None));
            self.notifier.spawn_rejection_alert(
                contacts.0,
                contacts.1,
                subject,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Document could not be verified".to_string()),
            );
        }

        Ok(VerificationOutcome {
            verification_id: Some(reference_id),
            job_id: None,
            result: result.redacted(),
            balance,
        })
    }

    /// Queue an asynchronous check and kick off its worker task.
    fn start_job(
        &self,
        request: VerificationRequest,
        balance: i64,
    ) -> Result<VerificationOutcome> {
        let job_id = new_id("JOB");
        self.store.insert_job(VerificationJob {
            job_id: job_id.clone(),
            tenant_id: request.tenant_id.clone(),
            doc_type: request.doc_type,
            inputs: request.inputs,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        })?;
        info!(job_id = %job_id, tenant_id = %request.tenant_id, "background check queued");
        let _ = self.events.send(GatewayEvent::JobCreated {
            job_id: job_id.clone(),
            tenant_id: request.tenant_id,
        });

        let worker = self.worker.clone();
        let spawned_id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.process(&spawned_id).await {
                error!(job_id = %spawned_id, error = %e, "background check worker failed");
            }
        });

        Ok(VerificationOutcome {
            verification_id: None,
            job_id: Some(job_id.clone()),
            result: StandardResult::pending(&job_id),
            balance,
        })
    }

    /// Dispatch one synchronous call through the adapter layer.
    ///
    /// Never errors: transport failures, exhausted retries and an open
    /// circuit all normalize into a failed result so the caller gets one
    /// uniform shape.
    async fn call_provider(&self, doc_type: DocumentType, inputs: &Inputs) -> StandardResult {
        if doc_type == DocumentType::ImageOcr {
            return self.registry.ocr().verify(inputs).await;
        }
        let adapter = match self.registry.resolve(doc_type) {
            Ok(adapter) => adapter,
            Err(e) => return StandardResult::failure(e.to_string(), serde_json::Value::Null),
        };
        let payload = adapter.build_request(inputs);
        match self
            .client
            .call_json(adapter.method(), adapter.endpoint(), &payload)
            .await
        {
            Ok(raw) => adapter.normalize_response(raw),
            Err(e) => {
                if matches!(e, Error::CircuitOpen) {
                    let _ = self.events.send(GatewayEvent::BreakerOpen {
                        doc_type: doc_type.to_string(),
                    });
                }
                warn!(doc_type = %doc_type, error = %e, "provider call failed");
                StandardResult::failure(e.to_string(), serde_json::Value::Null)
            }
        }
    }

    /// Read back a persisted verification record, masked for exposure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the record does not exist or
    /// belongs to a different tenant. The two cases are not
    /// distinguished, so record ids cannot be probed across tenants.
    pub fn record(&self, verification_id: &str, tenant_id: &str) -> Result<VerificationRecord> {
        self.store
            .verification(verification_id)
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.masked())
            .ok_or_else(|| Error::Storage(format!("verification {verification_id} not found")))
    }

    /// Point read of a queued job.
    #[must_use]
    pub fn job(&self, job_id: &str) -> Option<VerificationJob> {
        self.store.job(job_id)
    }

    /// Current wallet balance for a tenant. Absent wallets read as 0.
    #[must_use]
    pub fn balance(&self, tenant_id: &str) -> i64 {
        self.ledger.get_balance(tenant_id)
    }

    /// Credit a tenant's wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if `amount` is not positive.
    pub fn top_up(&self, tenant_id: &str, amount: i64) -> Result<i64> {
        self.ledger.credit(tenant_id, amount, &new_id("PAYM"))
    }

    /// Subscribe to gateway events.
    #[must_use]
    pub fn subscribe(&self) -> GatewayEventsChannel {
        self.events.subscribe()
    }

    /// The event sender, for subsystems that emit gateway events.
    pub(crate) fn events_sender(&self) -> &GatewayEventsSender {
        &self.events
    }

    /// The shared persistence layer.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// The job worker, for scheduled sweeps.
    #[must_use]
    pub fn worker(&self) -> &JobWorker {
        &self.worker
    }

    /// Gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    fn gateway() -> Gateway {
        Gateway::builder(GatewayConfig::default())
            .build()
            .expect("gateway")
    }

    fn request(doc_type: DocumentType) -> VerificationRequest {
        let mut inputs = Inputs::new();
        inputs.insert("name".to_string(), "Asha Rao".to_string());
        inputs.insert("address".to_string(), "14 Lake Road, Pune".to_string());
        VerificationRequest {
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
            doc_type,
            inputs,
            batch_id: None,
        }
    }

    #[tokio::test]
    async fn unfunded_tenant_is_rejected_before_any_call() {
        let gateway = gateway();
        let err = gateway
            .verify(request(DocumentType::TaxId))
            .await
            .unwrap_err();
        assert!(err.is_billing_error());
        assert_eq!(gateway.balance("t1"), 0);
    }

    #[tokio::test]
    async fn async_type_queues_a_job_and_returns_pending() {
        let gateway = gateway();
        gateway.top_up("t1", 200).expect("top-up");

        let outcome = gateway
            .verify(request(DocumentType::BackgroundCheck))
            .await
            .expect("verify");
        assert!(outcome.verification_id.is_none());
        let job_id = outcome.job_id.expect("job id");
        assert!(!outcome.result.is_valid);
        assert_eq!(outcome.result.error.as_deref(), Some("BACKGROUND_CHECK_STARTED"));
        assert_eq!(outcome.balance, 200 - gateway.config().verification_cost);

        let job = gateway.job(&job_id).expect("job persisted");
        assert_eq!(job.tenant_id, "t1");
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_tenant() {
        let gateway = gateway();
        assert!(gateway.record("VRF_unknown", "t1").is_err());
    }

    #[tokio::test]
    async fn top_up_then_balance_round_trips() {
        let gateway = gateway();
        gateway.top_up("t1", 500).expect("top-up");
        assert_eq!(gateway.balance("t1"), 500);
        assert_eq!(gateway.balance("t2"), 0);
    }
}
