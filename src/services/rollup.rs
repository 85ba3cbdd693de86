//! Incremental maintenance of the per-client payment aggregate, plus the
//! full rebuild the repair path treats as the source of truth.
//!
//! The increment functions keep `last_payment_date` equal to the maximum
//! payment date across the client's surviving payments and
//! `last_invoice_date` to the maximum issue date across surviving invoices,
//! so an apply-then-reverse pair restores the aggregate exactly.

use crate::models::{ClientPaymentAggregate, Invoice, Money, Payment};

/// Fold a newly created invoice into the aggregate.
pub fn record_invoice_created(stats: &mut ClientPaymentAggregate, invoice: &Invoice) {
    stats.total_invoices += 1;
    stats.total_amount += invoice.total;
    stats.total_unpaid += invoice.total;
    stats.last_invoice_date = stats.last_invoice_date.max(Some(invoice.issue_date));
    stats.recompute_reliability_score();
}

/// Adjust the amount fields after an unpaid invoice's total changed.
pub fn record_invoice_retotaled(
    stats: &mut ClientPaymentAggregate,
    old_total: Money,
    new_total: Money,
) {
    stats.total_amount = stats.total_amount - old_total + new_total;
    stats.total_unpaid = stats.total_unpaid - old_total + new_total;
}

/// Remove a deleted invoice's contribution. `remaining_invoices` is the
/// client's invoice set after the deletion, used to re-derive
/// `last_invoice_date`. On-time/late counters are untouched: they belong to
/// payments, which outlive their invoice.
pub fn record_invoice_deleted(
    stats: &mut ClientPaymentAggregate,
    invoice: &Invoice,
    remaining_invoices: &[Invoice],
) {
    stats.total_invoices = stats.total_invoices.saturating_sub(1);
    stats.total_amount -= invoice.total;
    stats.total_paid -= invoice.paid_amount;
    stats.total_unpaid -= invoice.remaining_amount;
    stats.last_invoice_date = remaining_invoices.iter().map(|i| i.issue_date).max();
    stats.recompute_reliability_score();
}

/// Fold an applied payment into the aggregate.
pub fn record_payment_applied(stats: &mut ClientPaymentAggregate, payment: &Payment) {
    stats.total_paid += payment.amount;
    stats.total_unpaid -= payment.amount;
    if payment.late {
        stats.late_payments += 1;
    } else {
        stats.on_time_payments += 1;
    }
    stats.last_payment_date = stats.last_payment_date.max(Some(payment.payment_date));
    stats.recompute_reliability_score();
}

/// Remove a reversed payment's contribution, using the classification the
/// payment carried from application time. `remaining_payments` is the
/// client's payment set after the reversal.
pub fn record_payment_reversed(
    stats: &mut ClientPaymentAggregate,
    payment: &Payment,
    remaining_payments: &[Payment],
) {
    stats.total_paid -= payment.amount;
    stats.total_unpaid += payment.amount;
    if payment.late {
        stats.late_payments = stats.late_payments.saturating_sub(1);
    } else {
        stats.on_time_payments = stats.on_time_payments.saturating_sub(1);
    }
    stats.last_payment_date = remaining_payments.iter().map(|p| p.payment_date).max();
    stats.recompute_reliability_score();
}

/// Rebuild the aggregate from the client's full ledger. Amount fields come
/// from surviving invoices; counters and `last_payment_date` come from the
/// payment records. Idempotent, and the canonical state the incremental
/// path approximates.
pub fn rebuild_aggregate(invoices: &[Invoice], payments: &[Payment]) -> ClientPaymentAggregate {
    let mut stats = ClientPaymentAggregate {
        total_invoices: invoices.len() as u64,
        total_amount: invoices.iter().map(|i| i.total).sum(),
        total_paid: invoices.iter().map(|i| i.paid_amount).sum(),
        total_unpaid: invoices.iter().map(|i| i.remaining_amount).sum(),
        on_time_payments: payments.iter().filter(|p| !p.late).count() as u64,
        late_payments: payments.iter().filter(|p| p.late).count() as u64,
        last_payment_date: payments.iter().map(|p| p.payment_date).max(),
        last_invoice_date: invoices.iter().map(|i| i.issue_date).max(),
        payment_reliability_score: 0,
    };
    stats.recompute_reliability_score();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::{InvoiceStatus, PaymentMethod, PaymentStatus};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn invoice(total_major: i64, paid_major: i64, issued: NaiveDate) -> Invoice {
        let total = Money::from_major(total_major);
        let paid = Money::from_major(paid_major);
        Invoice {
            invoice_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            line_items: Vec::new(),
            discount: Money::ZERO,
            tax_rate: Decimal::ZERO,
            subtotal: total,
            tax: Money::ZERO,
            total,
            paid_amount: paid,
            remaining_amount: total - paid,
            status: InvoiceStatus::Sent,
            has_been_sent: true,
            payment_method: None,
            payment_history: Vec::new(),
            issue_date: issued,
            due_date: date(31),
            paid_at: None,
            created_utc: Utc::now(),
        }
    }

    fn payment(amount_major: i64, paid_on: NaiveDate, late: bool) -> Payment {
        Payment {
            payment_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            amount: Money::from_major(amount_major),
            method: PaymentMethod::Card,
            payment_date: paid_on,
            reference_number: None,
            transaction_id: None,
            notes: None,
            status: PaymentStatus::Completed,
            late,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn apply_then_reverse_restores_aggregate() {
        let mut stats = ClientPaymentAggregate::default();
        record_invoice_created(&mut stats, &invoice(1000, 0, date(1)));
        let before = stats.clone();

        let p = payment(400, date(10), false);
        record_payment_applied(&mut stats, &p);
        assert_eq!(stats.total_paid, Money::from_major(400));
        assert_eq!(stats.on_time_payments, 1);
        assert_eq!(stats.last_payment_date, Some(date(10)));

        record_payment_reversed(&mut stats, &p, &[]);
        assert_eq!(stats, before);
    }

    #[test]
    fn reversal_restores_last_payment_date_from_survivors() {
        let mut stats = ClientPaymentAggregate::default();
        record_invoice_created(&mut stats, &invoice(1000, 0, date(1)));

        let first = payment(100, date(5), false);
        let second = payment(100, date(12), false);
        record_payment_applied(&mut stats, &first);
        record_payment_applied(&mut stats, &second);
        assert_eq!(stats.last_payment_date, Some(date(12)));

        record_payment_reversed(&mut stats, &second, std::slice::from_ref(&first));
        assert_eq!(stats.last_payment_date, Some(date(5)));
    }

    #[test]
    fn invoice_totals_flow_through_amount_fields() {
        let mut stats = ClientPaymentAggregate::default();
        record_invoice_created(&mut stats, &invoice(1000, 0, date(1)));
        record_invoice_created(&mut stats, &invoice(500, 0, date(3)));
        assert_eq!(stats.total_invoices, 2);
        assert_eq!(stats.total_amount, Money::from_major(1500));
        assert_eq!(stats.total_unpaid, Money::from_major(1500));
        assert_eq!(stats.last_invoice_date, Some(date(3)));

        record_invoice_retotaled(&mut stats, Money::from_major(500), Money::from_major(700));
        assert_eq!(stats.total_amount, Money::from_major(1700));
        assert_eq!(stats.total_unpaid, Money::from_major(1700));

        let doomed = invoice(1000, 0, date(1));
        let survivor = invoice(700, 0, date(3));
        record_invoice_deleted(&mut stats, &doomed, std::slice::from_ref(&survivor));
        assert_eq!(stats.total_invoices, 1);
        assert_eq!(stats.total_amount, Money::from_major(700));
        assert_eq!(stats.last_invoice_date, Some(date(3)));
    }

    #[test]
    fn rebuild_matches_incremental_bookkeeping() {
        let inv_a = invoice(1000, 400, date(1));
        let inv_b = invoice(500, 0, date(3));
        let pay = payment(400, date(10), true);

        let mut incremental = ClientPaymentAggregate::default();
        record_invoice_created(&mut incremental, &invoice(1000, 0, date(1)));
        record_invoice_created(&mut incremental, &inv_b);
        record_payment_applied(&mut incremental, &pay);

        let rebuilt = rebuild_aggregate(&[inv_a, inv_b], std::slice::from_ref(&pay));
        assert_eq!(rebuilt, incremental);
    }
}
