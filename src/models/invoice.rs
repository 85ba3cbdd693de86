//! Invoice model and the financial status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use super::payment::PaymentMethod;

/// Invoice financial status.
///
/// `Overdue` is a read-time view over the stored payment-derived status;
/// it is never persisted as a terminal state (see [`Invoice::status_as_of`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Derive the payment-based status from the cumulative paid amount.
///
/// Whether an unpaid invoice is `Draft` or `Sent` is not derivable from
/// amounts, so it is carried as an explicit flag.
pub fn derive_status(paid_amount: Money, total: Money, has_been_sent: bool) -> InvoiceStatus {
    if !paid_amount.is_positive() {
        if has_been_sent {
            InvoiceStatus::Sent
        } else {
            InvoiceStatus::Draft
        }
    } else if paid_amount < total {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Paid
    }
}

/// Apply the orthogonal overdue check as a view transform.
pub fn effective_status(status: InvoiceStatus, due_date: NaiveDate, today: NaiveDate) -> InvoiceStatus {
    if status != InvoiceStatus::Paid && due_date < today {
        InvoiceStatus::Overdue
    } else {
        status
    }
}

/// A billed line on an invoice. `amount` is always server-computed as
/// `rate * quantity`, never client-supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    pub rate: Money,
    pub amount: Money,
}

/// Local mirror of an applied payment, kept on the invoice for reversal.
/// Entries are matched by `payment_id`, not by the (possibly duplicated)
/// transaction reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub payment_id: Uuid,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub reference_number: Option<String>,
}

/// Invoice document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub line_items: Vec<LineItem>,
    pub discount: Money,
    /// Flat tax rate in percent.
    pub tax_rate: Decimal,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub status: InvoiceStatus,
    pub has_been_sent: bool,
    pub payment_method: Option<PaymentMethod>,
    pub payment_history: Vec<PaymentSummary>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    /// Recompute line-item amounts and the derived monetary fields from the
    /// line items, discount and tax rate.
    pub fn recalculate_totals(&mut self) {
        for item in &mut self.line_items {
            item.amount = item.rate * item.quantity;
        }
        self.subtotal = self.line_items.iter().map(|i| i.amount).sum();
        self.tax = self.subtotal.percentage(self.tax_rate);
        self.total = self.subtotal - self.discount + self.tax;
    }

    /// Re-derive `remaining_amount`, `status` and `paid_at` after any change
    /// to `paid_amount` or the totals.
    ///
    /// `paid_at` is set exactly once on entering `Paid` and cleared whenever
    /// the invoice is no longer fully paid, so an apply-then-reverse pair
    /// restores the original value.
    pub fn refresh_financials(&mut self, now: DateTime<Utc>) {
        self.remaining_amount = self.total.sub_clamped(self.paid_amount);
        self.status = derive_status(self.paid_amount, self.total, self.has_been_sent);
        match self.status {
            InvoiceStatus::Paid => {
                if self.paid_at.is_none() {
                    self.paid_at = Some(now);
                }
            }
            _ => self.paid_at = None,
        }
    }

    /// Externally visible status on a given day, with the overdue view
    /// transform applied.
    pub fn status_as_of(&self, today: NaiveDate) -> InvoiceStatus {
        effective_status(self.status, self.due_date, today)
    }
}

/// Input for a single line item.
#[derive(Debug, Clone)]
pub struct CreateLineItem {
    pub description: String,
    pub quantity: u32,
    pub rate: Money,
}

/// Input for creating a draft invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub line_items: Vec<CreateLineItem>,
    pub discount: Money,
    pub tax_rate: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Input for updating an unpaid invoice's billable content.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub line_items: Option<Vec<CreateLineItem>>,
    pub discount: Option<Money>,
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}
