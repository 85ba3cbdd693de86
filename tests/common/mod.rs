//! Common test utilities for reconciliation-core integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use reconciliation_core::models::{
    Client, CreateInvoice, CreateLineItem, Invoice, Money, PaymentMethod, RecordPayment,
};
use reconciliation_core::store::memory::InMemoryLedger;
use reconciliation_core::{ReconciliationService, RetryConfig};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reconciliation_core=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// The standard due date used by fixtures.
pub fn due_date() -> NaiveDate {
    date(2026, 2, 28)
}

/// A reconciliation service over a fresh in-memory ledger, scoped to one
/// owner.
pub struct TestLedger {
    pub service: ReconciliationService<InMemoryLedger>,
    pub owner_id: Uuid,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::default())
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryLedger::new());
        TestLedger {
            service: ReconciliationService::without_notifier(store, retry),
            owner_id: Uuid::new_v4(),
        }
    }

    pub async fn client(&self, name: &str) -> Client {
        self.service
            .create_client(self.owner_id, name)
            .await
            .expect("Failed to create client")
    }

    /// Invoice with subtotal 1000.00, 18% tax and no discount: total
    /// 1180.00. Created, then marked sent.
    pub async fn standard_invoice(&self, client_id: Uuid) -> Invoice {
        let (invoice, _) = self
            .service
            .create_invoice(
                self.owner_id,
                CreateInvoice {
                    client_id,
                    line_items: vec![CreateLineItem {
                        description: "Consulting".to_string(),
                        quantity: 1,
                        rate: Money::from_major(1000),
                    }],
                    discount: Money::ZERO,
                    tax_rate: Decimal::from(18),
                    issue_date: date(2026, 1, 15),
                    due_date: due_date(),
                },
            )
            .await
            .expect("Failed to create invoice");

        self.service
            .mark_invoice_sent(self.owner_id, invoice.invoice_id)
            .await
            .expect("Failed to mark invoice sent")
    }

    /// Invoice for a flat amount with no tax or discount, marked sent.
    pub async fn plain_invoice(&self, client_id: Uuid, total_major: i64) -> Invoice {
        let (invoice, _) = self
            .service
            .create_invoice(
                self.owner_id,
                CreateInvoice {
                    client_id,
                    line_items: vec![CreateLineItem {
                        description: "Service".to_string(),
                        quantity: 1,
                        rate: Money::from_major(total_major),
                    }],
                    discount: Money::ZERO,
                    tax_rate: Decimal::ZERO,
                    issue_date: date(2026, 1, 15),
                    due_date: due_date(),
                },
            )
            .await
            .expect("Failed to create invoice");

        self.service
            .mark_invoice_sent(self.owner_id, invoice.invoice_id)
            .await
            .expect("Failed to mark invoice sent")
    }
}

/// A card payment input with no references.
pub fn payment(invoice_id: Uuid, amount: Money, paid_on: NaiveDate) -> RecordPayment {
    RecordPayment {
        invoice_id,
        amount,
        method: PaymentMethod::Card,
        payment_date: paid_on,
        reference_number: None,
        transaction_id: None,
        notes: None,
    }
}
