//! Prepaid billing primitives: wallets and their transaction log.

pub mod ledger;

pub use ledger::Ledger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard cost of one verification in minor currency units.
pub const VERIFICATION_COST: i64 = 99;

/// Default low-balance alert threshold for newly created wallets.
pub const DEFAULT_LOW_BALANCE_THRESHOLD: i64 = 1000;

/// Direction of a wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Balance decreased (a verification was billed).
    Debit,
    /// Balance increased (a top-up).
    Credit,
}

/// One immutable entry in a wallet's append-only transaction log.
///
/// Always written in the same atomic unit as the balance change it
/// records: a wallet's balance must equal its initial balance plus the
/// sum of its transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Amount moved, in minor currency units. Always positive; the
    /// direction is carried by `kind`.
    pub amount: i64,
    /// Debit or credit.
    pub kind: TransactionKind,
    /// Verification or payment id this entry accounts for.
    pub reference_id: String,
    /// When the transaction was written.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub description: String,
}

/// Prepaid wallet, one per tenant. Balance never goes negative and is
/// mutated only through the ledger's atomic operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning tenant.
    pub tenant_id: String,
    /// Current balance in minor currency units.
    pub balance: i64,
    /// Currency code.
    pub currency: String,
    /// Balance at or below which a low-balance alert fires.
    pub low_balance_threshold: i64,
    /// Registered alert email for the tenant.
    pub contact_email: Option<String>,
    /// Registered alert phone for the tenant.
    pub contact_phone: Option<String>,
}

impl Wallet {
    /// A fresh zero-balance wallet with default thresholds.
    #[must_use]
    pub fn empty(tenant_id: &str, currency: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            balance: 0,
            currency: currency.to_string(),
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
            contact_email: None,
            contact_phone: None,
        }
    }
}
