//! Payment model for the reconciliation engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cheque,
    Card,
    Upi,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "cheque" => Some(PaymentMethod::Cheque),
            "card" => Some(PaymentMethod::Card),
            "upi" => Some(PaymentMethod::Upi),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A payment applied against a single invoice.
///
/// Immutable once created; the only permitted mutation is deletion through
/// the reversal engine. `late` records the on-time classification made at
/// application time (`payment_date > invoice.due_date`), so a reversal uses
/// the original classification even if the invoice is gone by then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub owner_id: Uuid,
    pub invoice_id: Uuid,
    pub client_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub status: PaymentStatus,
    pub late: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment against an invoice.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_labels_round_trip() {
        for method in [
            PaymentMethod::BankTransfer,
            PaymentMethod::Cheque,
            PaymentMethod::Card,
            PaymentMethod::Upi,
            PaymentMethod::Cash,
        ] {
            assert_eq!(PaymentMethod::from_string(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::from_string("barter"), None);
    }

    #[test]
    fn status_labels_are_stable() {
        assert_eq!(PaymentStatus::Completed.as_str(), "completed");
        assert_eq!(PaymentStatus::Pending.as_str(), "pending");
        assert_eq!(PaymentStatus::Failed.as_str(), "failed");
    }
}
