//! Client model and the denormalized per-client payment aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Denormalized payment statistics for one client.
///
/// Maintained incrementally by the reconciliation engine; the repair path in
/// `services::rollup` can rebuild it from the ledger when the fast path has
/// drifted. Invariant: `total_paid + total_unpaid == total_amount` after any
/// fully applied operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientPaymentAggregate {
    pub total_invoices: u64,
    pub total_amount: Money,
    pub total_paid: Money,
    pub total_unpaid: Money,
    pub on_time_payments: u64,
    pub late_payments: u64,
    pub last_payment_date: Option<NaiveDate>,
    pub last_invoice_date: Option<NaiveDate>,
    pub payment_reliability_score: u8,
}

impl ClientPaymentAggregate {
    /// Recompute the reliability score from the current counters.
    ///
    /// The score is the percentage of the client's invoices paid on time,
    /// with the invoice count (not the payment count) as denominator. That
    /// denominator is a deliberate product choice carried over unchanged.
    pub fn recompute_reliability_score(&mut self) {
        self.payment_reliability_score = reliability_score(self.on_time_payments, self.total_invoices);
    }
}

/// `round(100 * on_time / total_invoices)`, clamped to 100; zero when the
/// client has no invoices.
pub fn reliability_score(on_time_payments: u64, total_invoices: u64) -> u8 {
    if total_invoices == 0 {
        return 0;
    }
    let pct = (100.0 * on_time_payments as f64 / total_invoices as f64).round();
    pct.min(100.0) as u8
}

/// Client document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub payment_stats: ClientPaymentAggregate,
    pub created_utc: DateTime<Utc>,
}

impl Client {
    /// A new client starts with a zeroed aggregate.
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Client {
            client_id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            payment_stats: ClientPaymentAggregate::default(),
            created_utc: Utc::now(),
        }
    }
}
