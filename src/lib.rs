//! # veridesk
//!
//! A document verification gateway for multi-tenant onboarding flows.
//!
//! One entry point verifies any supported document type against the
//! relevant government registry or data provider:
//! - Per-type adapters translate between generic inputs and each
//!   provider's request/response shape
//! - A resilient client wraps every outbound call with retry and a
//!   shared circuit breaker
//! - A prepaid wallet ledger debits each attempt atomically before the
//!   provider is contacted
//! - Long-running checks queue an idempotent background job; bulk
//!   submissions run through a throttled sequential batch processor
//!
//! ## Example
//!
//! ```rust,no_run
//! use veridesk::{Gateway, GatewayConfig, VerificationRequest, DocumentType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::builder(GatewayConfig::default()).build()?;
//!     gateway.top_up("tenant-1", 500)?;
//!     let outcome = gateway
//!         .verify(VerificationRequest {
//!             tenant_id: "tenant-1".to_string(),
//!             user_id: "user-1".to_string(),
//!             doc_type: DocumentType::TaxId,
//!             inputs: [("id_number".to_string(), "ABCDE1234F".to_string())].into(),
//!             batch_id: None,
//!         })
//!         .await?;
//!     println!("valid: {}", outcome.result.is_valid);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod batch;
pub mod billing;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod mask;
pub mod notify;
pub mod store;
pub mod types;
pub mod worker;

pub use adapter::{Adapter, DocumentType, HttpMethod, Inputs, Registry, StandardResult};
pub use batch::{BatchItem, BatchProcessor, BatchSummary};
pub use billing::{Ledger, Transaction, TransactionKind, Wallet, VERIFICATION_COST};
pub use client::{CircuitBreaker, ResilientClient};
pub use config::{
    BatchConfig, BreakerConfig, GatewayConfig, NotifyConfig, ProviderConfig, ProviderCredentials,
    RetryConfig, WorkerConfig,
};
pub use error::{Error, Result};
pub use event::{GatewayEvent, GatewayEventsChannel};
pub use gateway::{Gateway, GatewayBuilder, VerificationOutcome, VerificationRequest};
pub use notify::Notifier;
pub use store::MemoryStore;
pub use types::{
    BatchJob, BatchStatus, JobStatus, VerificationJob, VerificationRecord, VerificationStatus,
};
pub use worker::JobWorker;
