//! Payment reversal integration tests.

mod common;

use common::{date, payment, TestLedger};
use reconciliation_core::models::{InvoiceStatus, Money, PaymentMethod, RecordPayment};
use reconciliation_core::LedgerError;
use uuid::Uuid;

#[tokio::test]
async fn reversing_final_payment_reopens_the_invoice() {
    let ledger = TestLedger::new();
    let client = ledger.client("Reopened Client").await;
    let invoice = ledger.standard_invoice(client.client_id).await;

    ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(500), date(2026, 2, 10)),
        )
        .await
        .expect("Failed to apply first payment");
    let second = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(680), date(2026, 2, 15)),
        )
        .await
        .expect("Failed to apply second payment");
    assert_eq!(second.invoice.status, InvoiceStatus::Paid);

    let reversed = ledger
        .service
        .reverse_payment(ledger.owner_id, second.payment.payment_id)
        .await
        .expect("Failed to reverse payment");

    let invoice = reversed.invoice.expect("Invoice should survive reversal");
    assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(invoice.paid_amount, Money::from_major(500));
    assert_eq!(invoice.remaining_amount, Money::from_major(680));
    assert_eq!(invoice.paid_at, None);

    // The payment record itself is gone.
    let lookup = ledger
        .service
        .get_payment(ledger.owner_id, second.payment.payment_id)
        .await;
    assert!(matches!(lookup, Err(LedgerError::NotFound("payment"))));
}

#[tokio::test]
async fn apply_then_reverse_restores_invoice_and_aggregate_exactly() {
    let ledger = TestLedger::new();
    let client = ledger.client("Round Trip Client").await;
    let invoice = ledger.standard_invoice(client.client_id).await;

    let first = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(500), date(2026, 2, 10)),
        )
        .await
        .expect("Failed to apply first payment");

    let invoice_before = first.invoice.clone();
    let client_before = first.client.clone();

    let second = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            RecordPayment {
                method: PaymentMethod::Upi,
                ..payment(invoice.invoice_id, Money::from_major(300), date(2026, 2, 20))
            },
        )
        .await
        .expect("Failed to apply second payment");

    let reversed = ledger
        .service
        .reverse_payment(ledger.owner_id, second.payment.payment_id)
        .await
        .expect("Failed to reverse payment");

    assert_eq!(reversed.invoice.as_ref(), Some(&invoice_before));
    assert_eq!(reversed.client, client_before);
    // In particular the payment method fell back to the surviving payment's.
    assert_eq!(
        reversed.invoice.unwrap().payment_method,
        Some(PaymentMethod::Card)
    );
}

#[tokio::test]
async fn reversal_matches_history_entries_by_payment_id() {
    let ledger = TestLedger::new();
    let client = ledger.client("Duplicate Reference Client").await;
    let invoice = ledger.plain_invoice(client.client_id, 300).await;

    // Two payments sharing one transaction reference.
    let mut input = payment(invoice.invoice_id, Money::from_major(100), date(2026, 2, 1));
    input.transaction_id = Some("SHARED-REF".to_string());
    let first = ledger
        .service
        .apply_payment(ledger.owner_id, input.clone())
        .await
        .expect("Failed to apply first payment");
    input.payment_date = date(2026, 2, 2);
    let second = ledger
        .service
        .apply_payment(ledger.owner_id, input)
        .await
        .expect("Failed to apply second payment");

    let reversed = ledger
        .service
        .reverse_payment(ledger.owner_id, second.payment.payment_id)
        .await
        .expect("Failed to reverse payment");

    let history = reversed.invoice.expect("invoice").payment_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payment_id, first.payment.payment_id);
    assert_eq!(history[0].transaction_id.as_deref(), Some("SHARED-REF"));
}

#[tokio::test]
async fn reversal_survives_a_deleted_invoice() {
    let ledger = TestLedger::new();
    let client = ledger.client("Orphan Client").await;
    let invoice = ledger.plain_invoice(client.client_id, 100).await;

    let applied = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(40), date(2026, 2, 10)),
        )
        .await
        .expect("Failed to apply payment");
    assert_eq!(applied.client.payment_stats.on_time_payments, 1);

    ledger
        .service
        .delete_invoice(ledger.owner_id, invoice.invoice_id)
        .await
        .expect("Failed to delete invoice");

    let reversed = ledger
        .service
        .reverse_payment(ledger.owner_id, applied.payment.payment_id)
        .await
        .expect("Reversal must succeed without the invoice");

    assert!(reversed.invoice.is_none());
    assert_eq!(reversed.client.payment_stats.on_time_payments, 0);
    assert_eq!(reversed.client.payment_stats.last_payment_date, None);
}

#[tokio::test]
async fn reversal_uses_the_original_late_classification() {
    let ledger = TestLedger::new();
    let client = ledger.client("Late Reversal Client").await;
    let invoice = ledger.plain_invoice(client.client_id, 100).await;

    // Paid after the due date.
    let applied = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(100), date(2026, 3, 10)),
        )
        .await
        .expect("Failed to apply payment");
    assert_eq!(applied.client.payment_stats.late_payments, 1);

    let reversed = ledger
        .service
        .reverse_payment(ledger.owner_id, applied.payment.payment_id)
        .await
        .expect("Failed to reverse payment");

    // The late counter is decremented, not the on-time one.
    assert_eq!(reversed.client.payment_stats.late_payments, 0);
    assert_eq!(reversed.client.payment_stats.on_time_payments, 0);
}

#[tokio::test]
async fn unknown_and_foreign_payments_are_rejected() {
    let ledger = TestLedger::new();
    let client = ledger.client("Scope Client").await;
    let invoice = ledger.plain_invoice(client.client_id, 100).await;

    let missing = ledger
        .service
        .reverse_payment(ledger.owner_id, Uuid::new_v4())
        .await;
    assert!(matches!(missing, Err(LedgerError::NotFound("payment"))));

    let applied = ledger
        .service
        .apply_payment(
            ledger.owner_id,
            payment(invoice.invoice_id, Money::from_major(50), date(2026, 2, 10)),
        )
        .await
        .expect("Failed to apply payment");

    let foreign = ledger
        .service
        .reverse_payment(Uuid::new_v4(), applied.payment.payment_id)
        .await;
    assert!(matches!(foreign, Err(LedgerError::Forbidden("payment"))));

    // Double reversal: the second attempt no longer finds the payment.
    ledger
        .service
        .reverse_payment(ledger.owner_id, applied.payment.payment_id)
        .await
        .expect("Failed to reverse payment");
    let again = ledger
        .service
        .reverse_payment(ledger.owner_id, applied.payment.payment_id)
        .await;
    assert!(matches!(again, Err(LedgerError::NotFound("payment"))));
}
