//! Transactional billing ledger gating every verification call.
//!
//! Debits are serializable: read balance, verify coverage, write the new
//! balance and append the DEBIT entry as one atomic unit. Concurrent
//! debits for the same tenant can never jointly drive the balance
//! negative. A debit that succeeds is never reversed, even if the
//! provider call that follows it fails.

use super::{Transaction, TransactionKind, Wallet};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::store::MemoryStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Atomic prepaid-wallet operations, keyed by tenant.
pub struct Ledger {
    store: Arc<MemoryStore>,
    notifier: Arc<Notifier>,
    currency: String,
}

impl Ledger {
    /// Create a ledger over the shared store.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>, notifier: Arc<Notifier>, currency: String) -> Self {
        Self {
            store,
            notifier,
            currency,
        }
    }

    /// Debit a tenant's wallet for one verification attempt.
    ///
    /// If no wallet exists, one is created with balance 0 inside the same
    /// transaction and the call fails - the first attempt provisions the
    /// wallet and is rejected. Returns the new balance on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientBalance`] when the balance cannot
    /// cover `cost`.
    pub fn debit(&self, tenant_id: &str, cost: i64, reference_id: &str) -> Result<i64> {
        let (new_balance, alert) = self.store.wallet_transaction(
            tenant_id,
            || Wallet::empty(tenant_id, &self.currency),
            |doc, created| {
                if created {
                    // First-call-creates-then-rejects: the fresh wallet
                    // persists, the triggering debit does not.
                    return Err(Error::InsufficientBalance {
                        required: cost,
                        available: 0,
                    });
                }
                if doc.wallet.balance < cost {
                    return Err(Error::InsufficientBalance {
                        required: cost,
                        available: doc.wallet.balance,
                    });
                }
                doc.wallet.balance -= cost;
                doc.transactions.push(Transaction {
                    amount: cost,
                    kind: TransactionKind::Debit,
                    reference_id: reference_id.to_string(),
                    timestamp: Utc::now(),
                    description: format!("Identity verification - {reference_id}"),
                });
                let alert = if doc.wallet.balance <= doc.wallet.low_balance_threshold {
                    Some((
                        doc.wallet.contact_email.clone(),
                        doc.wallet.contact_phone.clone(),
                    ))
                } else {
                    None
                };
                Ok((doc.wallet.balance, alert))
            },
        )?;

        if let Some((email, phone)) = alert {
            warn!(tenant_id, new_balance, "wallet reached low-balance threshold");
            self.notifier.spawn_low_balance_alert(email, phone, new_balance);
        }
        Ok(new_balance)
    }

    /// Credit a tenant's wallet (top-up). Creates the wallet when absent.
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns an error if `amount` is not positive.
    pub fn credit(&self, tenant_id: &str, amount: i64, reference_id: &str) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::InvalidInput(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let new_balance = self.store.wallet_transaction(
            tenant_id,
            || Wallet::empty(tenant_id, &self.currency),
            |doc, _| {
                doc.wallet.balance += amount;
                doc.transactions.push(Transaction {
                    amount,
                    kind: TransactionKind::Credit,
                    reference_id: reference_id.to_string(),
                    timestamp: Utc::now(),
                    description: "Wallet top-up".to_string(),
                });
                Ok(doc.wallet.balance)
            },
        )?;
        info!(tenant_id, amount, new_balance, "wallet credited");
        Ok(new_balance)
    }

    /// Point read of a tenant's balance. Absent wallets read as 0.
    #[must_use]
    pub fn get_balance(&self, tenant_id: &str) -> i64 {
        self.store.wallet(tenant_id).map_or(0, |w| w.balance)
    }
}
